fn main() -> anyhow::Result<()> {
    csv_query_cli::run()
}
