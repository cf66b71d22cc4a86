fn main() -> anyhow::Result<()> {
    webobj::cli::run_cli()
}
