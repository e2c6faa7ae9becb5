use std::backtrace::Backtrace;
use std::fmt::{self, Write};
use std::io;
use std::process;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// One thread of the process, as reported by procfs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ThreadInfo {
    id: u64,
    name: String,
    state: String,
    /// Kernel function the thread is sleeping in, if any.
    wait_channel: Option<String>,
    /// Syscall the thread is blocked in, if readable.
    syscall: Option<String>,
    /// Kernel stack frames; only readable with elevated privileges.
    kernel_stack: Vec<String>,
}

/// Renders the full capture report.
pub(super) fn render(sequence: u64, backtrace: &Backtrace) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Program Status: capture #{sequence}")?;
    write_header(&mut out)?;
    writeln!(out)?;
    write_threads(&mut out)?;
    writeln!(out)?;
    writeln!(
        out,
        "User-space backtrace of the capturing thread only ({}):",
        thread::current().name().unwrap_or("unnamed")
    )?;
    writeln!(out, "{backtrace}")?;
    Ok(out)
}

/// Renders the header and thread table without a backtrace.
pub(crate) fn render_thread_table() -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_header(&mut out)?;
    writeln!(out)?;
    write_threads(&mut out)?;
    Ok(out)
}

fn write_header(out: &mut String) -> fmt::Result {
    let captured = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    writeln!(out, "pid: {}", process::id())?;
    writeln!(out, "captured: {captured} (seconds since epoch)")
}

fn write_threads(out: &mut String) -> fmt::Result {
    match threads() {
        Ok(threads) => {
            writeln!(out, "Threads ({}):", threads.len())?;
            writeln!(out, "{:>8}  {:<16}  STATE", "TID", "NAME")?;
            for info in &threads {
                writeln!(out, "{:>8}  {:<16}  {}", info.id, info.name, info.state)?;
            }
            writeln!(out)?;
            writeln!(out, "Thread stacks:")?;
            for info in &threads {
                write_thread_stack(out, info)?;
            }
            Ok(())
        }
        Err(error) => writeln!(out, "Threads: unavailable ({error})"),
    }
}

fn write_thread_stack(out: &mut String, info: &ThreadInfo) -> fmt::Result {
    writeln!(out, "Thread {} \"{}\" ({})", info.id, info.name, info.state)?;
    writeln!(
        out,
        "  wait channel: {}",
        info.wait_channel.as_deref().unwrap_or("-")
    )?;
    writeln!(
        out,
        "  syscall: {}",
        info.syscall.as_deref().unwrap_or("unavailable")
    )?;
    if info.kernel_stack.is_empty() {
        writeln!(out, "  kernel stack: unavailable")?;
    } else {
        writeln!(out, "  kernel stack:")?;
        for frame in &info.kernel_stack {
            writeln!(out, "    {frame}")?;
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn threads() -> io::Result<Vec<ThreadInfo>> {
    use std::fs;

    let mut threads = Vec::new();
    for entry in fs::read_dir("/proc/self/task")? {
        let entry = entry?;
        let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
        else {
            continue;
        };
        // Threads may exit between listing and reading.
        let name = fs::read_to_string(entry.path().join("comm"))
            .map(|comm| comm.trim_end().to_owned())
            .unwrap_or_default();
        let state = fs::read_to_string(entry.path().join("stat"))
            .ok()
            .and_then(|stat| parse_state(&stat))
            .unwrap_or_else(|| "exited".to_owned());
        let wait_channel = fs::read_to_string(entry.path().join("wchan"))
            .ok()
            .and_then(|wchan| parse_wait_channel(&wchan));
        let syscall = fs::read_to_string(entry.path().join("syscall"))
            .ok()
            .and_then(|syscall| parse_syscall(&syscall));
        let kernel_stack = fs::read_to_string(entry.path().join("stack"))
            .map(|stack| parse_kernel_stack(&stack))
            .unwrap_or_default();
        threads.push(ThreadInfo {
            id,
            name,
            state,
            wait_channel,
            syscall,
            kernel_stack,
        });
    }
    threads.sort_by_key(|info| info.id);
    Ok(threads)
}

#[cfg(not(target_os = "linux"))]
fn threads() -> io::Result<Vec<ThreadInfo>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread listing requires procfs",
    ))
}

/// Extracts the scheduler state from a `/proc/<pid>/task/<tid>/stat` line.
/// The command name is parenthesised and may itself contain spaces or
/// parentheses, so the state is read after the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code, reason = "procfs only"))]
fn parse_state(stat: &str) -> Option<String> {
    let (_, rest) = stat.rsplit_once(')')?;
    let code = rest.split_whitespace().next()?;
    let label = match code {
        "R" => "running",
        "S" => "sleeping",
        "D" => "disk-wait",
        "T" | "t" => "stopped",
        "Z" => "zombie",
        "I" => "idle",
        other => other,
    };
    Some(label.to_owned())
}

/// `wchan` holds `0` when the thread is not sleeping in the kernel.
#[cfg_attr(not(target_os = "linux"), allow(dead_code, reason = "procfs only"))]
fn parse_wait_channel(wchan: &str) -> Option<String> {
    let symbol = wchan.trim();
    (!symbol.is_empty() && symbol != "0").then(|| symbol.to_owned())
}

/// Summarises `/proc/<pid>/task/<tid>/syscall`: a syscall number followed by
/// its arguments, `-1` when blocked outside a syscall, or `running`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code, reason = "procfs only"))]
fn parse_syscall(syscall: &str) -> Option<String> {
    let mut fields = syscall.split_whitespace();
    let number = fields.next()?;
    match number {
        "running" => Some("running in user space".to_owned()),
        "-1" => Some("blocked outside a syscall".to_owned()),
        _ => {
            let number = number.parse::<i64>().ok()?;
            let arguments: Vec<&str> = fields.take(6).collect();
            Some(format!("#{number} ({})", arguments.join(", ")))
        }
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code, reason = "procfs only"))]
fn parse_kernel_stack(stack: &str) -> Vec<String> {
    stack
        .lines()
        .map(str::trim)
        .filter(|frame| !frame.is_empty())
        .map(str::to_owned)
        .collect()
}
