fn main() -> anyhow::Result<()> {
    postdash::cli::run()
}
