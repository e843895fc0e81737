use anyhow::Result;

fn main() -> Result<()> {
    critterden::app::run()
}
