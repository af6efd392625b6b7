fn main() -> anyhow::Result<()> {
    coldvault::cli::run()
}
