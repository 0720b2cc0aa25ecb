//! 対話用の入出力
//!
//! REPL とトラブルシューティングの対話は同じ入力を順番に読みます。
//! [`Console`] を `Arc` で共有し、1行の読み書きの間だけロックします。

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Mutex;

/// 行単位の対話入出力
pub struct Console {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    /// 標準入出力
    pub fn stdio() -> Self {
        Self::new(Box::new(BufReader::new(io::stdin())), Box::new(io::stdout()))
    }

    /// 1行出力する
    pub fn say(&self, text: &str) -> io::Result<()> {
        let mut output = self.output.lock().map_err(|_| poisoned())?;
        writeln!(output, "{text}")?;
        output.flush()
    }

    /// プロンプトを出して1行読む（EOF なら `None`）
    pub fn read_line(&self, prompt: &str) -> io::Result<Option<String>> {
        {
            let mut output = self.output.lock().map_err(|_| poisoned())?;
            write!(output, "{prompt}")?;
            output.flush()?;
        }

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .map_err(|_| poisoned())?
            .read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// y/N の確認
    pub fn confirm(&self, question: &str) -> io::Result<bool> {
        let answer = self.read_line(&format!("{question} (y/N) "))?;
        Ok(matches!(
            answer.as_deref().map(|a| a.trim().to_lowercase()).as_deref(),
            Some("y" | "yes")
        ))
    }
}

fn poisoned() -> io::Error {
    io::Error::other("console lock poisoned")
}
