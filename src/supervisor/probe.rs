use std::process::Child;
use std::sync::{Arc, Mutex};

/// What one health-check tick saw of the supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeObservation {
    /// The process is gone.
    Exited,
    /// A foreground dialog is visible; the concatenated text of its
    /// static fields (possibly empty).
    Dialog(String),
    /// The process is alive with no dialog showing.
    NoDialog,
    /// A dialog was there but vanished or became unreadable mid-read.
    /// Transient; neither progress nor idleness.
    Unreadable,
}

/// Health probe over the supervised process. The production probe reads
/// the tool's UI state; tests substitute a scripted sequence.
pub trait DialogProbe: Send {
    fn observe(&mut self) -> ProbeObservation;
}

/// Builds a probe bound to a freshly launched child. Injected into the
/// supervisor so the polling machinery is independent of how the process
/// is actually observed.
pub type ProbeFactory = Box<dyn Fn(Arc<Mutex<Child>>, u32) -> Box<dyn DialogProbe> + Send>;

/// Production probe: process liveness via the shared child handle, dialog
/// text via the platform surface (Windows-only; elsewhere the tool has no
/// inspectable dialog and only exits are observable).
pub struct ProcessProbe {
    child: Arc<Mutex<Child>>,
    pid: u32,
}

impl ProcessProbe {
    pub fn new(child: Arc<Mutex<Child>>, pid: u32) -> Self {
        Self { child, pid }
    }

    pub fn factory() -> ProbeFactory {
        Box::new(|child, pid| Box::new(ProcessProbe::new(child, pid)))
    }
}

impl DialogProbe for ProcessProbe {
    fn observe(&mut self) -> ProbeObservation {
        let exited = {
            let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
            matches!(child.try_wait(), Ok(Some(_)))
        };
        if exited {
            return ProbeObservation::Exited;
        }
        dialog::inspect(self.pid)
    }
}

/// Replays a fixed observation sequence, then reports `NoDialog` forever.
pub struct ScriptedProbe {
    script: std::vec::IntoIter<ProbeObservation>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ProbeObservation>) -> Self {
        Self {
            script: script.into_iter(),
        }
    }

    pub fn factory(script: Vec<ProbeObservation>) -> ProbeFactory {
        Box::new(move |_child, _pid| Box::new(ScriptedProbe::new(script.clone())))
    }
}

impl DialogProbe for ScriptedProbe {
    fn observe(&mut self) -> ProbeObservation {
        self.script.next().unwrap_or(ProbeObservation::NoDialog)
    }
}

#[cfg(windows)]
mod dialog {
    use super::ProbeObservation;
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumChildWindows, EnumWindows, GetClassNameW, GetWindowTextW, GetWindowThreadProcessId,
        IsWindow, IsWindowVisible,
    };

    const DIALOG_CLASS: &str = "#32770";

    struct DialogScan {
        pid: u32,
        dialogs: Vec<HWND>,
    }

    /// Collects every visible top-level dialog owned by the pid and
    /// concatenates their children's text. Scanning all dialogs at once
    /// sidesteps the ambiguity when more than one is up.
    pub fn inspect(pid: u32) -> ProbeObservation {
        let mut scan = DialogScan {
            pid,
            dialogs: Vec::new(),
        };
        unsafe {
            let _ = EnumWindows(Some(collect_dialogs), LPARAM(&mut scan as *mut _ as isize));
        }
        if scan.dialogs.is_empty() {
            return ProbeObservation::NoDialog;
        }

        let mut text = String::new();
        let mut any_alive = false;
        for hwnd in scan.dialogs {
            unsafe {
                if !IsWindow(hwnd).as_bool() {
                    continue;
                }
                any_alive = true;
                let _ = EnumChildWindows(
                    hwnd,
                    Some(collect_text),
                    LPARAM(&mut text as *mut String as isize),
                );
            }
        }
        if !any_alive {
            // The dialog went away between enumeration and read.
            return ProbeObservation::Unreadable;
        }
        ProbeObservation::Dialog(text.trim().to_string())
    }

    unsafe extern "system" fn collect_dialogs(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let scan = unsafe { &mut *(lparam.0 as *mut DialogScan) };
        let mut pid = 0u32;
        unsafe {
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
        }
        if pid == scan.pid && unsafe { IsWindowVisible(hwnd) }.as_bool() {
            let mut cls = [0u16; 32];
            let n = unsafe { GetClassNameW(hwnd, &mut cls) };
            if n > 0 && String::from_utf16_lossy(&cls[..n as usize]) == DIALOG_CLASS {
                scan.dialogs.push(hwnd);
            }
        }
        BOOL(1)
    }

    unsafe extern "system" fn collect_text(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let text = unsafe { &mut *(lparam.0 as *mut String) };
        let mut buf = [0u16; 512];
        let n = unsafe { GetWindowTextW(hwnd, &mut buf) };
        if n > 0 {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&String::from_utf16_lossy(&buf[..n as usize]));
        }
        BOOL(1)
    }
}

#[cfg(not(windows))]
mod dialog {
    use super::ProbeObservation;

    pub fn inspect(_pid: u32) -> ProbeObservation {
        ProbeObservation::NoDialog
    }
}
