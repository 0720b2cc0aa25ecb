//! Twitter ワークフロー
//!
//! # 責務
//!
//! - Twitter API v2 を使ったツイートの投稿・メンションの取得・メンションへの返信
//! - API エラーを [`WorkflowErrorKind`] に分類する
//! - 返信本文が指定されていない場合、バックエンドで返信文を生成する
//!
//! # インテント
//!
//! | インテント       | パラメータ                                  |
//! |------------------|---------------------------------------------|
//! | `postTweet`      | `text` (必須)                               |
//! | `getMentions`    | `limit` (省略時 10、1 以上、100 で頭打ち)   |
//! | `replyToMention` | `mentionId` (数字のみ、省略時は最新), `text` (省略時は生成) |
//!
//! # 認証
//!
//! 環境変数 `TWITTER_ACCESS_TOKEN` の OAuth 2.0 ユーザーコンテキストトークンを
//! `Authorization: Bearer` ヘッダーで送信します。
//!
//! # ステータスの分類
//!
//! - 401 → [`WorkflowErrorKind::MissingCredentials`]（資格情報の再設定が必要）
//! - 403 → [`WorkflowErrorKind::PermissionDenied`]（アプリの権限不足）
//! - その他の 4xx → [`WorkflowErrorKind::UpstreamRejected`]
//! - 5xx・通信失敗 → [`WorkflowErrorKind::UpstreamUnavailable`]

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::backend::{Backend, complete_with_timeout};
use crate::config::descriptor::WorkflowDescriptor;
use crate::config::settings::BackendOptions;
use crate::engine::ParamMap;
use super::traits::{Payload, Workflow, WorkflowError, WorkflowErrorKind};

/// 記述子（`workflows/twitter.toml`）
const DESCRIPTOR_TOML: &str = include_str!("../../workflows/twitter.toml");

/// デフォルトのエンドポイント
const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

/// アクセストークンを読み込む環境変数
pub const ACCESS_TOKEN_ENV: &str = "TWITTER_ACCESS_TOKEN";

/// ツイートの最大文字数
pub const MAX_TWEET_CHARS: usize = 280;

/// メンション取得件数の API 上の範囲
const MENTIONS_MIN: i64 = 5;
const MENTIONS_MAX: i64 = 100;

/// エラーメッセージに含める本文の最大文字数
const ERROR_BODY_CHARS: usize = 300;

const REPLY_SYSTEM_PROMPT: &str = "Generate a friendly and professional response to the tweet you are given.
Requirements:
- Keep it under 280 characters
- Be helpful and positive
- Maintain professional tone
- Include relevant emojis if appropriate
- Don't include quotes in the response
Reply with the response text only.";

/// 埋め込みの記述子を読み込む
pub fn descriptor() -> Result<WorkflowDescriptor, WorkflowError> {
    WorkflowDescriptor::from_toml(DESCRIPTOR_TOML)
        .map_err(|e| WorkflowError::new(WorkflowErrorKind::Unknown, e.to_string()))
}

/// Twitter ワークフロー
pub struct TwitterWorkflow {
    descriptor: WorkflowDescriptor,
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    backend: Arc<dyn Backend>,
    backend_options: BackendOptions,
}

impl TwitterWorkflow {
    /// 環境変数からアクセストークンを読み込んで生成
    ///
    /// トークンが未設定でも生成は成功し、呼び出し時に
    /// [`WorkflowErrorKind::MissingCredentials`] が返されます。
    pub fn from_env(
        backend: Arc<dyn Backend>,
        backend_options: BackendOptions,
    ) -> Result<Self, WorkflowError> {
        let token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(backend, backend_options, token)
    }

    pub fn new(
        backend: Arc<dyn Backend>,
        backend_options: BackendOptions,
        access_token: Option<String>,
    ) -> Result<Self, WorkflowError> {
        let http = reqwest::Client::builder()
            .timeout(backend_options.timeout())
            .build()
            .map_err(|e| {
                WorkflowError::new(
                    WorkflowErrorKind::Unknown,
                    format!("HTTP クライアントの初期化に失敗しました: {e}"),
                )
            })?;

        Ok(Self {
            descriptor: descriptor()?,
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token,
            backend,
            backend_options,
        })
    }

    fn token(&self) -> Result<&str, WorkflowError> {
        self.access_token.as_deref().ok_or_else(|| {
            WorkflowError::new(
                WorkflowErrorKind::MissingCredentials,
                format!("{ACCESS_TOKEN_ENV} が設定されていません"),
            )
        })
    }

    async fn get(&self, path: &str) -> Result<Value, WorkflowError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "GET");
        let request = self.http.get(&url).bearer_auth(self.token()?);
        self.send(request).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, WorkflowError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "POST");
        let request = self
            .http
            .post(&url)
            .bearer_auth(self.token()?)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, WorkflowError> {
        let response = request.send().await.map_err(|e| {
            WorkflowError::new(WorkflowErrorKind::UpstreamUnavailable, e.to_string())
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            WorkflowError::new(WorkflowErrorKind::UpstreamUnavailable, e.to_string())
        })?;

        if !(200..300).contains(&status) {
            return Err(error_from_status(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            WorkflowError::new(
                WorkflowErrorKind::UpstreamUnavailable,
                format!("Twitter API のレスポンスを解釈できません: {e}"),
            )
        })
    }

    async fn me(&self) -> Result<User, WorkflowError> {
        let value = self.get("/users/me").await?;
        data_field(value)
    }

    async fn mentions(&self, limit: i64) -> Result<Vec<Tweet>, WorkflowError> {
        let me = self.me().await?;
        let max_results = limit.clamp(MENTIONS_MIN, MENTIONS_MAX);
        let value = self
            .get(&format!(
                "/users/{}/mentions?max_results={max_results}&tweet.fields=created_at,author_id",
                me.id
            ))
            .await?;
        let mut tweets = parse_mentions(value)?;
        tweets.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        Ok(tweets)
    }

    async fn post_tweet(&self, text: &str) -> Result<Payload, WorkflowError> {
        let value = self.post("/tweets", &json!({ "text": text })).await?;
        let tweet: Tweet = data_field(value)?;
        info!(tweet_id = %tweet.id, "tweet posted");

        Ok(Payload::new(
            format!("ツイートを投稿しました: '{text}'"),
            json!({ "id": tweet.id, "text": text }),
        ))
    }

    async fn get_mentions(&self, limit: i64) -> Result<Payload, WorkflowError> {
        let tweets = self.mentions(limit).await?;
        Ok(Payload::new(
            format_mentions(&tweets),
            json!({ "mentions": tweets.iter().map(Tweet::to_json).collect::<Vec<_>>() }),
        ))
    }

    async fn reply_to_mention(
        &self,
        mention_id: Option<&str>,
        text: Option<&str>,
    ) -> Result<Payload, WorkflowError> {
        let mention = match mention_id {
            Some(id) => {
                let value = self.get(&format!("/tweets/{id}")).await?;
                data_field::<Tweet>(value)?
            }
            None => match self.mentions(1).await?.into_iter().next() {
                Some(tweet) => tweet,
                None => {
                    return Ok(Payload::new(
                        "返信できるメンションがありません",
                        json!({ "mentions": [] }),
                    ));
                }
            },
        };

        let reply = match text {
            Some(text) => truncate_tweet(text),
            None => self.generate_reply(&mention.text).await?,
        };

        let value = self
            .post(
                "/tweets",
                &json!({ "text": reply, "reply": { "in_reply_to_tweet_id": mention.id } }),
            )
            .await?;
        let posted: Tweet = data_field(value)?;
        info!(tweet_id = %posted.id, in_reply_to = %mention.id, "reply posted");

        Ok(Payload::new(
            format!("返信を投稿しました: '{reply}'"),
            json!({ "id": posted.id, "in_reply_to": mention.id, "text": reply }),
        ))
    }

    async fn generate_reply(&self, mention_text: &str) -> Result<String, WorkflowError> {
        let completion = complete_with_timeout(
            self.backend.as_ref(),
            REPLY_SYSTEM_PROMPT,
            &format!("Tweet: {mention_text}"),
            &self.backend_options,
        )
        .await
        .map_err(|e| {
            WorkflowError::new(
                WorkflowErrorKind::UpstreamUnavailable,
                format!("返信文の生成に失敗しました: {e}"),
            )
        })?;

        let reply = completion.content.trim().trim_matches('"').trim();
        if reply.is_empty() {
            return Err(WorkflowError::new(
                WorkflowErrorKind::UpstreamUnavailable,
                "返信文が空でした",
            ));
        }
        Ok(truncate_tweet(reply))
    }
}

#[async_trait]
impl Workflow for TwitterWorkflow {
    fn descriptor(&self) -> &WorkflowDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, intent: &str, parameters: &ParamMap) -> Result<Payload, WorkflowError> {
        let text = parameters.get("text").and_then(|v| v.as_str());
        match intent {
            "postTweet" => {
                let text = text.ok_or_else(|| {
                    WorkflowError::new(WorkflowErrorKind::Unknown, "text がありません")
                })?;
                self.post_tweet(text).await
            }
            "getMentions" => {
                let limit = parameters
                    .get("limit")
                    .and_then(|v| v.as_int())
                    .unwrap_or(10);
                self.get_mentions(check_limit(limit)?).await
            }
            "replyToMention" => {
                let mention_id = parameters
                    .get("mentionId")
                    .and_then(|v| v.as_str())
                    .map(check_tweet_id)
                    .transpose()?;
                self.reply_to_mention(mention_id, text).await
            }
            other => Err(WorkflowError::new(
                WorkflowErrorKind::Unknown,
                format!("未知のインテントです: {other}"),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
}

impl Tweet {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "text": self.text,
            "created_at": self.created_at,
            "author_id": self.author_id,
        })
    }
}

/// `{"data": ...}` の中身を取り出す
fn data_field<T: serde::de::DeserializeOwned>(mut value: Value) -> Result<T, WorkflowError> {
    let data = value
        .get_mut("data")
        .map(Value::take)
        .ok_or_else(|| {
            WorkflowError::new(
                WorkflowErrorKind::UpstreamUnavailable,
                "Twitter API のレスポンスに data がありません",
            )
        })?;
    serde_json::from_value(data).map_err(|e| {
        WorkflowError::new(
            WorkflowErrorKind::UpstreamUnavailable,
            format!("Twitter API のレスポンスを解釈できません: {e}"),
        )
    })
}

/// メンション一覧（0件の場合 `data` は省略される）
fn parse_mentions(value: Value) -> Result<Vec<Tweet>, WorkflowError> {
    if value.get("data").is_none() {
        return Ok(Vec::new());
    }
    data_field(value)
}

fn format_mentions(tweets: &[Tweet]) -> String {
    if tweets.is_empty() {
        return "最近のメンションはありません".to_string();
    }

    let mut out = String::from("最近のメンション:\n");
    for tweet in tweets {
        out.push_str(&format!("\nID: {}\nText: {}\n", tweet.id, tweet.text));
        if let Some(created_at) = &tweet.created_at {
            out.push_str(&format!("Time: {created_at}\n"));
        }
        out.push_str(&"-".repeat(40));
    }
    out
}

/// 280 文字を超える場合は末尾を `...` にして切り詰める
pub fn truncate_tweet(text: &str) -> String {
    if text.chars().count() <= MAX_TWEET_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_TWEET_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

/// ツイート ID は URL のパスに埋め込むため、数字だけを受け付ける
fn check_tweet_id(id: &str) -> Result<&str, WorkflowError> {
    let id = id.trim();
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WorkflowError::new(
            WorkflowErrorKind::UpstreamRejected,
            format!("メンション ID は数字で指定してください: '{id}'"),
        ));
    }
    Ok(id)
}

/// 取得件数は 1 以上（100 を超える分は API の上限に丸める）
fn check_limit(limit: i64) -> Result<i64, WorkflowError> {
    if limit < 1 {
        return Err(WorkflowError::new(
            WorkflowErrorKind::UpstreamRejected,
            format!("取得件数は 1 以上で指定してください: {limit}"),
        ));
    }
    Ok(limit.min(MENTIONS_MAX))
}

/// 失敗した HTTP レスポンスを分類する
fn error_from_status(status: u16, body: &str) -> WorkflowError {
    let detail: String = body.chars().take(ERROR_BODY_CHARS).collect();
    let message = format!("Twitter API HTTP {status}: {detail}");
    let kind = match status {
        401 => WorkflowErrorKind::MissingCredentials,
        403 => WorkflowErrorKind::PermissionDenied,
        400..=499 => WorkflowErrorKind::UpstreamRejected,
        _ => WorkflowErrorKind::UpstreamUnavailable,
    };
    WorkflowError::new(kind, message)
}
