use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    sop_cli::main_entry().await
}
