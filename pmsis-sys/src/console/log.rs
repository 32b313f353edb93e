// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0
use super::{Console, ConsoleWriter};

// The logger utilizes core::fmt to format the log messages because ufmt formatting is not
// compatible with (dependencies of) the log crate.
use core::fmt::Write;
use log::{LevelFilter, Metadata, Record};
use pmsis_hal::sync::SpinMutex;

/// Logger for the `log` crate writing one line per record to a [`Console`].
///
/// Records at or above `display_level` are prefixed with their level, those at or above
/// `display_source` with their file and line.
pub struct ConsoleLogger<C: Console> {
    console: SpinMutex<Option<ConsoleWriter<C>>>,
    pub display_level: LevelFilter,
    pub display_source: LevelFilter,
}

impl<C: Console> ConsoleLogger<C> {
    /// A logger that drops records until a console is attached.
    pub const fn new() -> Self {
        Self::with_filters(LevelFilter::Trace, LevelFilter::Trace)
    }

    pub const fn with_filters(display_level: LevelFilter, display_source: LevelFilter) -> Self {
        ConsoleLogger {
            console: SpinMutex::new(None),
            display_level,
            display_source,
        }
    }

    pub fn set_console(&self, console: C) {
        *self.console.lock() = Some(ConsoleWriter(console));
    }

    pub fn take_console(&self) -> Option<C> {
        self.console.lock().take().map(ConsoleWriter::into_inner)
    }
}

impl<C: Console + Send + 'static> ConsoleLogger<C> {
    /// Install `self` as the global logger and let records up to `level` through.
    pub fn init(&'static self, level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl<C: Console> Default for ConsoleLogger<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Console + Send> log::Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut console = self.console.lock();
        let Some(l) = console.as_mut() else {
            return;
        };
        // Writing to a console cannot fail.
        if record.level() <= self.display_level {
            let _ = write!(l, "{} | ", record.level());
        }
        if record.level() <= self.display_source {
            let _ = write!(
                l,
                "{}:{} - ",
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0)
            );
        }
        let _ = writeln!(l, "{}", record.args());
    }

    fn flush(&self) {}
}
