//! Tracing setup shared between the CLI entrypoint and (future) other
//! front-ends. Grounded on the teacher's own `tracing-subscriber` setup
//! in its `main.rs`; this crate has no MCP/stdio constraint so logs go
//! to stderr by default with no special framing requirement.

pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("novelist=info".parse()?),
        )
        .init();
    Ok(())
}
