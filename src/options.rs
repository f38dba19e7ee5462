//! Tailing behavior configuration.

use std::time::Duration;

/// Controls how a [`TailingReader`](crate::TailingReader) waits, times out
/// and reacts to deletion or truncation of the tailed file.
///
/// A `Duration::ZERO` timeout means "wait indefinitely".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Block until the file exists instead of failing right away. Also
    /// keeps the reader waiting for the file to come back after a
    /// deletion when `close_on_delete` is off.
    pub wait_for_file: bool,
    pub wait_for_file_timeout: Duration,
    /// Report end-of-stream once the tailed file is deleted or renamed away.
    pub close_on_delete: bool,
    /// Report end-of-stream once the file shrinks below the read offset.
    pub close_on_truncate: bool,
    /// How long a read waits for new data.
    pub idle_timeout: Duration,
    /// Turn wait/idle timeouts into end-of-stream rather than errors.
    pub treat_timeouts_as_eof: bool,
}

impl Options {
    /// Used when the caller does not pass any options: wait for the file
    /// indefinitely and keep tailing across deletions.
    pub const DEFAULT: Options = Options {
        wait_for_file: true,
        wait_for_file_timeout: Duration::ZERO,
        close_on_delete: false,
        close_on_truncate: false,
        idle_timeout: Duration::ZERO,
        treat_timeouts_as_eof: false,
    };

    /// The zero-valued configuration every option is folded onto.
    pub const fn new() -> Self {
        Options {
            wait_for_file: false,
            wait_for_file_timeout: Duration::ZERO,
            close_on_delete: false,
            close_on_truncate: false,
            idle_timeout: Duration::ZERO,
            treat_timeouts_as_eof: false,
        }
    }

    pub fn with_wait_for_file(self, wait: bool, timeout: Duration) -> Self {
        self.with(TailOption::WaitForFile(wait, timeout))
    }

    pub fn with_close_on_delete(self, close: bool) -> Self {
        self.with(TailOption::CloseOnDelete(close))
    }

    pub fn with_close_on_truncate(self, close: bool) -> Self {
        self.with(TailOption::CloseOnTruncate(close))
    }

    pub fn with_idle_timeout(self, timeout: Duration) -> Self {
        self.with(TailOption::IdleTimeout(timeout))
    }

    pub fn with_timeouts_as_eof(self, as_eof: bool) -> Self {
        self.with(TailOption::TimeoutsAsEof(as_eof))
    }

    /// Applies a single option, returning the updated configuration.
    pub fn with(mut self, option: TailOption) -> Self {
        option.apply(&mut self);
        self
    }

    /// `None` when the timeout is zero, i.e. wait indefinitely.
    pub(crate) fn wait_for_file_limit(&self) -> Option<Duration> {
        non_zero(self.wait_for_file_timeout)
    }

    pub(crate) fn idle_limit(&self) -> Option<Duration> {
        non_zero(self.idle_timeout)
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::DEFAULT
    }
}

/// Folds options left to right over [`Options::new`]; later options
/// override earlier ones touching the same field.
impl FromIterator<TailOption> for Options {
    fn from_iter<I: IntoIterator<Item = TailOption>>(iter: I) -> Self {
        iter.into_iter().fold(Options::new(), Options::with)
    }
}

/// A single named configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOption {
    /// Sets `wait_for_file` and `wait_for_file_timeout` together.
    WaitForFile(bool, Duration),
    CloseOnDelete(bool),
    CloseOnTruncate(bool),
    IdleTimeout(Duration),
    TimeoutsAsEof(bool),
}

impl TailOption {
    pub fn apply(self, options: &mut Options) {
        match self {
            TailOption::WaitForFile(wait, timeout) => {
                options.wait_for_file = wait;
                options.wait_for_file_timeout = timeout;
            }
            TailOption::CloseOnDelete(close) => options.close_on_delete = close,
            TailOption::CloseOnTruncate(close) => options.close_on_truncate = close,
            TailOption::IdleTimeout(timeout) => options.idle_timeout = timeout,
            TailOption::TimeoutsAsEof(as_eof) => options.treat_timeouts_as_eof = as_eof,
        }
    }
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() { None } else { Some(timeout) }
}
