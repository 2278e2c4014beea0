use async_trait::async_trait;
use eyre::Result;

pub mod chat;
pub mod health;
pub mod models;
pub mod status;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
