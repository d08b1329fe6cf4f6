//! 局域网地址探测

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// 尽力探测本机面向局域网的地址，失败时回退到环回地址
///
/// 通过向公网地址 connect 一个 UDP socket 来让内核选路，
/// 并不会真的发包。这个函数永远不对外报错。
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
