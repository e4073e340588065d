use log::LevelFilter;

/// Installs the global logger: `[LEVEL target] message` lines on stderr.
///
/// Only the first call in a process succeeds; later ones return the
/// `SetLoggerError` from `log`.
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

/// `--verbose` wins, then the manifest, then `info`.
pub fn effective_level(verbose: bool, configured: LevelFilter) -> LevelFilter {
    if verbose {
        configured.max(LevelFilter::Debug)
    } else {
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_but_never_lowers() {
        assert_eq!(effective_level(true, LevelFilter::Info), LevelFilter::Debug);
        assert_eq!(effective_level(true, LevelFilter::Trace), LevelFilter::Trace);
        assert_eq!(effective_level(false, LevelFilter::Warn), LevelFilter::Warn);
    }
}
