//! Terminal logging with colored module prefixes and a progress bar.
//!
//! ```ignore
//! log!("load"; "loaded {} files", count);
//!
//! let progress = Progress::new("pages", pages.len());
//! progress.inc();
//! progress.finish();
//! ```
//!
//! Informational output is muted by [`set_quiet`]; `[error]` and `[warn]`
//! lines are always printed.

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Set by `--quiet`
static QUIET: AtomicBool = AtomicBool::new(false);

/// Whether a progress bar currently occupies the last terminal line
static BAR_ACTIVE: AtomicBool = AtomicBool::new(false);

// Progress bar format: "[module] [████░░░░] 42/100"

/// Length of brackets around module name plus the following space: "[] "
const PREFIX_OVERHEAD: usize = 3;
/// Bar wrapper plus the space before the count: " [] "
const BAR_OVERHEAD: usize = 4;
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

/// Mute informational logging.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::SeqCst);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::SeqCst)
}

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Print a message under `[module]`.
///
/// Single-line messages are truncated to the terminal width; multi-line
/// messages (error chains) are printed whole.
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let always = matches!(module_lower.as_str(), "error" | "warn");
    if is_quiet() && !always {
        return;
    }

    let prefix = colorize_prefix(module, &module_lower);
    let width = get_terminal_width() as usize;
    let mut stdout = stdout().lock();

    let bar_active = BAR_ACTIVE.load(Ordering::SeqCst);
    if bar_active {
        execute!(stdout, cursor::MoveUp(1)).ok();
        execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
    }

    if message.contains('\n') {
        writeln!(stdout, "{prefix} {message}").ok();
    } else {
        let max_msg_len = width.saturating_sub(module.len() + PREFIX_OVERHEAD);
        writeln!(stdout, "{prefix} {}", truncate_str(message, max_msg_len)).ok();
    }

    if bar_active {
        writeln!(stdout).ok();
    }
    stdout.flush().ok();
}

fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress Bar
// ============================================================================

/// A single progress bar drawn on the last terminal line.
///
/// Does nothing when logging is quiet or there is at most one item.
pub struct Progress {
    prefix: ColoredString,
    prefix_len: usize,
    total: usize,
    current: AtomicUsize,
    enabled: bool,
    lock: Mutex<()>,
}

impl Progress {
    pub fn new(module: &str, total: usize) -> Self {
        let enabled = !is_quiet() && total > 1;
        if enabled {
            let mut stdout = stdout().lock();
            writeln!(stdout).ok();
            stdout.flush().ok();
            BAR_ACTIVE.store(true, Ordering::SeqCst);
        }
        Self {
            prefix: colorize_prefix(module, &module.to_ascii_lowercase()),
            prefix_len: module.len() + PREFIX_OVERHEAD,
            total,
            current: AtomicUsize::new(0),
            enabled,
            lock: Mutex::new(()),
        }
    }

    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        if self.enabled {
            self.display(current);
        }
    }

    fn display(&self, current: usize) {
        let _guard = self.lock.lock().ok();

        let progress_text = format!("{}/{}", current, self.total);
        let bar_width = bar_width(
            get_terminal_width() as usize,
            self.prefix_len + BAR_OVERHEAD + progress_text.len(),
        );
        let filled = (current * bar_width) / self.total.max(1);
        let bar = "█".repeat(filled.min(bar_width)) + &"░".repeat(bar_width.saturating_sub(filled));

        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(1)).ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        writeln!(stdout, "{} [{}] {}", self.prefix, bar, progress_text).ok();
        stdout.flush().ok();
    }

    /// Clear the bar from the terminal.
    pub fn finish(&self) {
        if !self.enabled || !BAR_ACTIVE.swap(false, Ordering::SeqCst) {
            return;
        }
        let _guard = self.lock.lock().ok();
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(1)).ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        stdout.flush().ok();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

fn bar_width(terminal_width: usize, overhead: usize) -> usize {
    terminal_width
        .saturating_sub(overhead)
        .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH)
}
