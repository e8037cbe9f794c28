//! Root binary shim for the terminal client. See `chatter_cli::cli`.

fn main() -> anyhow::Result<()> {
    chatter_cli::cli::run()
}
