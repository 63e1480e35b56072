use std::{
    backtrace::Backtrace,
    fmt::Write as _,
    fs::OpenOptions,
    io::Write as _,
    panic::PanicHookInfo,
    path::Path,
    thread,
};

use chrono::Local;

use crate::logging::LOG_FILE_NAME;

/// Replace the process panic hook with one that routes panics through
/// `tracing` and, in `panic = "abort"` builds, also appends the record
/// straight to today's log file. The release profile aborts on panic, so the
/// non-blocking log writer gets no chance to flush; the direct append is what
/// survives.
pub fn install(log_dir: impl AsRef<Path>) {
    let log_dir = log_dir.as_ref().to_path_buf();
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let record = render(info);
            tracing::error!(target: "herald::panic", "{record}");
            if cfg!(panic = "abort") {
                let _ = append_to_daily_log(&log_dir, &record);
            }
        }));
        default_hook(info);
    }));
}

fn render(info: &PanicHookInfo<'_>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} PANIC thread={}",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
        thread::current().name().unwrap_or("<unnamed>"),
    );
    if let Some(loc) = info.location() {
        let _ = write!(out, " location={}:{}:{}", loc.file(), loc.line(), loc.column());
    }

    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .map(str::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| info.to_string());
    let _ = write!(out, " payload={message}");
    let _ = write!(out, "\nBacktrace:\n{}", Backtrace::force_capture());
    out
}

// File name must match the daily rotation scheme in `logging`, so the panic
// record lands in the same file the subscriber was writing to.
fn append_to_daily_log(log_dir: &Path, record: &str) -> std::io::Result<()> {
    let path = log_dir.join(format!("{LOG_FILE_NAME}.{}", Local::now().format("%Y-%m-%d")));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{record}")
}
