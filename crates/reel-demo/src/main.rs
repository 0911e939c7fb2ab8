fn main() -> anyhow::Result<()> {
    reel_demo::run()
}
