fn main() -> anyhow::Result<()> {
    boq_xlsx::cli::run()
}
