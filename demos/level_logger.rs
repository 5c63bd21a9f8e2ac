use {
    levelroll::{debug, error, info, warn, Level, LevelLogger, LoggerConfig, RotationSize, TimeZone},
    std::sync::Arc,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level: Level = std::env::var("LOG_LEVEL").as_deref().unwrap_or("info").parse()?;
    let logger = Arc::new(LevelLogger::start(
        LoggerConfig::new(level)
            .path("./logs/app.log")
            .max_bytes(RotationSize::KB(4))
            .backup_count(3)
            .time_zone(TimeZone::UTC),
    ));

    debug!(logger, "only shown with LOG_LEVEL=debug");
    for request in 0..200 {
        info!(logger, "handled request #{request}");
        if request % 50 == 0 {
            warn!(logger, "slow request #{request}");
        }
    }
    error!(logger, "upstream returned {}", 503);

    logger.stop()?;
    Ok(())
}
