//! Root binary shim for the relay daemon. See `chatterd::cli`.

fn main() -> anyhow::Result<()> {
    chatterd::cli::run()
}
