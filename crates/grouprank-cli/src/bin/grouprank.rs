fn main() -> anyhow::Result<()> {
    env_logger::init();
    grouprank_cli::cli::run()
}
