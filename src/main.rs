fn main() -> anyhow::Result<()> {
    listwise::cli::run()
}
