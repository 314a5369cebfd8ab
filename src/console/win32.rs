//! Win32 console input backend
//!
//! Opens the shared `CONIN$` input buffer and injects synthesized records
//! with `WriteConsoleInput`. Also exposes the live keyboard layout through
//! `VkKeyScan`/`MapVirtualKey` so bridged characters resolve to the keys a
//! local user would actually press.

use std::io;
use std::mem;
use std::ptr;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, GENERIC_READ, GENERIC_WRITE, HANDLE};
use windows::Win32::Security::SECURITY_ATTRIBUTES;
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Console::{
    GetConsoleMode, SetConsoleCP, SetConsoleOutputCP, WriteConsoleInputW, CONSOLE_MODE,
    INPUT_RECORD, INPUT_RECORD_0, KEY_EVENT, KEY_EVENT_RECORD, KEY_EVENT_RECORD_0,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, VkKeyScanW, MAPVK_VK_TO_VSC};

use super::{ConsoleMode, ConsoleQueue};
use crate::core::keys::{KeyCombo, KeyEvent, KeyboardLayout, Modifiers};

// VkKeyScan modifier bits in the high byte of its return value.
const SCAN_SHIFT: i16 = 0x100;
const SCAN_CTRL: i16 = 0x200;
const SCAN_ALT: i16 = 0x400;

/// Handle to the host console's input buffer.
pub struct Win32Console {
    handle: HANDLE,
}

// Safety: the handle is only used from the thread driving the bridge loop.
unsafe impl Send for Win32Console {}

impl Win32Console {
    /// Open `CONIN$`.
    ///
    /// The handle is created inheritable so the child process reads from
    /// the very same queue the bridge writes to.
    pub fn open() -> io::Result<Self> {
        let name: Vec<u16> = "CONIN$".encode_utf16().chain(std::iter::once(0)).collect();
        let attrs = SECURITY_ATTRIBUTES {
            nLength: mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
            lpSecurityDescriptor: ptr::null_mut(),
            bInheritHandle: true.into(),
        };
        let handle = unsafe {
            CreateFileW(
                PCWSTR(name.as_ptr()),
                (GENERIC_READ | GENERIC_WRITE).0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                Some(&attrs),
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            )
        }
        .map_err(to_io_error)?;
        Ok(Self { handle })
    }
}

impl ConsoleQueue for Win32Console {
    fn post(&mut self, events: &[KeyEvent]) -> io::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let records: Vec<INPUT_RECORD> = events.iter().map(to_input_record).collect();
        let mut written = 0u32;
        unsafe { WriteConsoleInputW(self.handle, &records, &mut written) }.map_err(to_io_error)
    }

    fn input_mode(&self) -> io::Result<ConsoleMode> {
        let mut mode = CONSOLE_MODE(0);
        unsafe { GetConsoleMode(self.handle, &mut mode) }.map_err(to_io_error)?;
        Ok(ConsoleMode::from_bits_retain(mode.0))
    }

    fn set_codepage(&mut self, codepage: u32) -> io::Result<()> {
        unsafe {
            SetConsoleCP(codepage).map_err(to_io_error)?;
            SetConsoleOutputCP(codepage).map_err(to_io_error)
        }
    }
}

impl Drop for Win32Console {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

fn to_input_record(event: &KeyEvent) -> INPUT_RECORD {
    INPUT_RECORD {
        EventType: KEY_EVENT as u16,
        Event: INPUT_RECORD_0 {
            KeyEvent: KEY_EVENT_RECORD {
                bKeyDown: event.down.into(),
                wRepeatCount: event.repeat,
                wVirtualKeyCode: event.virtual_key,
                wVirtualScanCode: event.scan_code,
                uChar: KEY_EVENT_RECORD_0 {
                    // Supplementary-plane characters carry their first
                    // UTF-16 unit; console readers see at most a BMP char.
                    UnicodeChar: event.ch.map_or(0, first_utf16_unit),
                },
                dwControlKeyState: event.modifiers.control_key_state(),
            },
        },
    }
}

fn first_utf16_unit(ch: char) -> u16 {
    let mut units = [0u16; 2];
    ch.encode_utf16(&mut units);
    units[0]
}

fn to_io_error(e: windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(e.code().0 as i32)
}

/// Keyboard layout resolved through the live Win32 layout APIs.
pub struct NativeKeyboard;

impl KeyboardLayout for NativeKeyboard {
    fn combo_for_char(&self, ch: char) -> Option<KeyCombo> {
        let mut units = [0u16; 2];
        if ch.encode_utf16(&mut units).len() != 1 {
            return None;
        }
        let resolved = unsafe { VkKeyScanW(units[0]) };
        if resolved == -1 {
            return None;
        }
        let mut modifiers = Modifiers::empty();
        if resolved & SCAN_SHIFT != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if resolved & SCAN_CTRL != 0 {
            modifiers |= Modifiers::CTRL;
        }
        if resolved & SCAN_ALT != 0 {
            modifiers |= Modifiers::ALT;
        }
        Some(KeyCombo {
            virtual_key: (resolved & 0xFF) as u16,
            modifiers,
        })
    }

    fn scan_code(&self, virtual_key: u16) -> u16 {
        unsafe { MapVirtualKeyW(virtual_key as u32, MAPVK_VK_TO_VSC) as u16 }
    }
}
