//! Stdout notifier for dry runs

use super::Notifier;
use async_trait::async_trait;

/// Prints messages instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn emit(&self, text: &str) -> anyhow::Result<()> {
        println!("[DRY-RUN] {text}");
        Ok(())
    }
}
