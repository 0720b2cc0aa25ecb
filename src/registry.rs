//! ワークフローレジストリ
//!
//! # 責務
//!
//! - 利用可能なワークフロー記述子を保持する
//! - 名前によるワークフロー検索
//! - 抽出プロンプト生成のための全記述子の列挙
//!
//! 登録は起動時に一度だけ行われ、その後は読み取り専用です。
//! 構築後は `Arc<WorkflowRegistry>` として共有し、同期なしで並行に読み出せます。

use std::collections::HashMap;

use tracing::debug;

use crate::config::descriptor::WorkflowDescriptor;
use crate::error::RegistryError;

/// ワークフローレジストリ
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    /// 登録順の記述子
    descriptors: Vec<WorkflowDescriptor>,
    /// 名前 → `descriptors` のインデックス
    index: HashMap<String, usize>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記述子を登録する
    ///
    /// # エラー
    ///
    /// - [`RegistryError::DuplicateWorkflow`] - 同名のワークフローが登録済み
    pub fn register(&mut self, descriptor: WorkflowDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateWorkflow(name));
        }

        debug!(workflow = %name, intents = descriptor.intents().len(), "registering workflow");
        self.index.insert(name, self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// 名前でワークフローを検索する
    ///
    /// # エラー
    ///
    /// - [`RegistryError::NotFound`] - 該当するワークフローがない
    pub fn lookup(&self, name: &str) -> Result<&WorkflowDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// 全記述子を登録順に列挙する
    ///
    /// 返されるイテレータは遅延・有限で、`clone()` すれば何度でも最初から辿れます。
    pub fn all_descriptors(&self) -> std::slice::Iter<'_, WorkflowDescriptor> {
        self.descriptors.iter()
    }

    /// 登録順のインデックス
    pub fn registration_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> WorkflowDescriptor {
        WorkflowDescriptor::from_toml(&format!(
            "[workflow]\nname = \"{name}\"\n\n[[intents]]\nname = \"run\"\nexamples = [\"run {name}\"]\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = WorkflowRegistry::new();
        registry.register(descriptor("twitter")).unwrap();
        registry.register(descriptor("calendar")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("calendar").unwrap().name(), "calendar");
        assert_eq!(registry.registration_index("twitter"), Some(0));
        assert_eq!(registry.registration_index("calendar"), Some(1));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register(descriptor("twitter")).unwrap();
        assert_eq!(
            registry.register(descriptor("twitter")),
            Err(RegistryError::DuplicateWorkflow("twitter".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let mut registry = WorkflowRegistry::new();
        registry.register(descriptor("twitter")).unwrap();
        assert_eq!(
            registry.lookup("Twitter").unwrap_err(),
            RegistryError::NotFound("Twitter".to_string())
        );
    }

    #[test]
    fn test_all_descriptors_is_restartable() {
        let mut registry = WorkflowRegistry::new();
        assert!(registry.is_empty());
        for name in ["a", "b", "c"] {
            registry.register(descriptor(name)).unwrap();
        }

        let iter = registry.all_descriptors();
        let first: Vec<_> = iter.clone().map(|d| d.name()).collect();
        let second: Vec<_> = iter.map(|d| d.name()).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }
}
