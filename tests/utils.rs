use crossbeam_channel::{unbounded, Receiver};
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

/// Bind a UDP socket on an ephemeral loopback port and forward every
/// datagram it receives into a channel, as text, until the socket goes
/// quiet for a couple of seconds.
pub fn udp_receiver() -> (SocketAddr, Receiver<String>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = unbounded();

    thread::spawn(move || {
        let mut buf = [0_u8; 1024];
        while let Ok((n, _addr)) = socket.recv_from(&mut buf) {
            let packet = String::from_utf8_lossy(&buf[..n]).into_owned();
            if tx.send(packet).is_err() {
                break;
            }
        }
    });

    (addr, rx)
}
