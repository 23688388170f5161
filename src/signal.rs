//! Sending an unrecoverable termination signal to a job's child process
//! (spec.md §4.6: "kill the pid via the OS with an unrecoverable
//! termination signal").
//!
//! Grounded on `agent-exec::kill::send_signal`, trimmed to the single
//! SIGKILL/TerminateProcess case this scheduler needs — there is no
//! process-tree/Job Object management here because the supervisor spawns
//! the child directly rather than through a re-exec'd hidden subcommand.

use anyhow::Result;

#[cfg(unix)]
pub fn kill(pid: u32) -> Result<()> {
    // SAFETY: kill(2) is safe to call with any pid and valid signal number.
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: no such process — already gone, treat as success.
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err.into());
        }
    }
    Ok(())
}

#[cfg(windows)]
pub fn kill(pid: u32) -> Result<()> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    unsafe {
        let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
            Ok(h) => h,
            // Process already gone — treat as success.
            Err(_) => return Ok(()),
        };
        let result = TerminateProcess(handle, 1);
        let _ = CloseHandle(handle);
        result.map_err(|e| anyhow::anyhow!("TerminateProcess(pid={pid}) failed: {e}"))
    }
}

#[cfg(not(any(unix, windows)))]
pub fn kill(_pid: u32) -> Result<()> {
    anyhow::bail!("killing a process is not supported on this platform")
}
