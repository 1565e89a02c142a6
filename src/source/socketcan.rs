// src/source/socketcan.rs
//
// SocketCAN source for Linux native CAN interfaces. Frames are rendered in
// candump's text format so the decoder sees the same input whether the
// capture comes from `candump` or straight from the kernel.
//
// Requires the interface to be configured first:
//   sudo ip link set can0 up type can bitrate 1000000

/// Render a frame the way `candump <iface>` prints it:
///   `  can0  241   [8]  9A 32 00 01 E5 01 04 00`
///   `  can0  12345678   [2]  AA BB`       (extended)
///   `  can0  241  [12]  00 01 ...`        (CAN FD)
pub fn render_candump_line(
    interface: &str,
    frame_id: u32,
    is_extended: bool,
    is_fd: bool,
    data: &[u8],
) -> String {
    let id = if is_extended {
        format!("{:08X}", frame_id)
    } else {
        format!("{:03X}", frame_id)
    };
    let len = if is_fd {
        format!("  [{:02}]", data.len())
    } else {
        format!("   [{}]", data.len())
    };

    let mut line = format!("  {}  {}{}  ", interface, id, len);
    let bytes: Vec<String> = data.iter().map(|b| format!("{:02X}", b)).collect();
    line.push_str(&bytes.join(" "));
    line
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use socketcan::{CanAnyFrame, CanFdSocket, EmbeddedFrame, Frame, Socket};
    use std::io;
    use std::time::Duration;

    use super::render_candump_line;
    use crate::error::MonitorError;
    use crate::source::{FrameSource, Poll};

    /// Read timeout so the stop flag is re-checked on a quiet bus.
    const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Reads classic and FD frames from a SocketCAN interface.
    pub struct SocketCanSource {
        label: String,
        interface: String,
        socket: CanFdSocket,
    }

    impl SocketCanSource {
        pub fn open(interface: &str) -> Result<Self, MonitorError> {
            let label = format!("socketcan({})", interface);
            let socket = CanFdSocket::open(interface)
                .map_err(|e| MonitorError::source_unavailable(&label, e.to_string()))?;

            socket
                .set_read_timeout(READ_TIMEOUT)
                .map_err(|e| MonitorError::source_unavailable(&label, format!("set read timeout: {}", e)))?;

            tlog!("[socketcan] Connected to {}", interface);

            Ok(Self {
                label,
                interface: interface.to_string(),
                socket,
            })
        }

        fn render(&self, frame: CanAnyFrame) -> Option<String> {
            match frame {
                CanAnyFrame::Normal(f) => Some(render_candump_line(
                    &self.interface,
                    f.raw_id() & 0x1FFF_FFFF,
                    f.is_extended(),
                    false,
                    f.data(),
                )),
                CanAnyFrame::Fd(f) => Some(render_candump_line(
                    &self.interface,
                    f.raw_id() & 0x1FFF_FFFF,
                    f.is_extended(),
                    true,
                    f.data(),
                )),
                // No payload to decode
                CanAnyFrame::Remote(_) | CanAnyFrame::Error(_) => None,
            }
        }
    }

    impl FrameSource for SocketCanSource {
        fn label(&self) -> &str {
            &self.label
        }

        fn poll_line(&mut self) -> io::Result<Poll> {
            match self.socket.read_frame() {
                Ok(frame) => Ok(self.render(frame).map_or(Poll::Idle, Poll::Line)),
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    Ok(Poll::Idle)
                }
                Err(e) => Err(e),
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::SocketCanSource;
