use {
    levelroll::{RotatingWriterBuilder, RotationSize},
    std::io::Write,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = RotatingWriterBuilder::new("./logs/sized.log")
        .max_bytes(RotationSize::KB(16)) // Rotate at 16KB
        .backup_count(5) // Keep sized.log.1 ..= sized.log.5
        .file_mode(0o640) // Set file permissions to: owner rw, group r, others none
        .on_error(|err| eprintln!("log file trouble: {err}"))
        .build()?;

    // Simulate writing logs that will trigger size-based rotation
    for i in 1..=1000 {
        writeln!(
            writer,
            "Log entry #{}: This is a sample log message that will contribute to file size",
            i
        )?;
    }

    for backup in writer.backup_files()? {
        println!("{}", backup.display());
    }
    writer.close()?;

    Ok(())
}
