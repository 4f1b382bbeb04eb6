//! 预览程序: 加载一个扫描 (或合成体模), 生成各剥离深度的场景与中间切片.

mod export;
mod loader;
mod report;
mod runner;

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    let report = runner::run()?;
    report.analyze();
    Ok(())
}
