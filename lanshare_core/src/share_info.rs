//! Connection details shown to the operator at startup

use qrcode::QrCode;
use qrcode::render::unicode;
use std::net::IpAddr;

/// Pick the address a LAN peer is most likely to reach.
///
/// Prefers 192.168.x.x, then 10.x.x.x, then 172.x.x.x, then any other
/// non-loopback IPv4 address.
pub fn pick_lan_ip<I>(interfaces: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = (String, IpAddr)>,
{
    let mut best: Option<(u8, IpAddr)> = None;

    for (_name, ip) in interfaces {
        let IpAddr::V4(v4) = ip else { continue };
        if v4.is_loopback() || v4.is_unspecified() {
            continue;
        }

        let rank = match v4.octets() {
            [192, 168, ..] => 0,
            [10, ..] => 1,
            [172, ..] => 2,
            _ => 3,
        };
        if best.is_none_or(|(best_rank, _)| rank < best_rank) {
            best = Some((rank, ip));
        }
    }

    best.map(|(_, ip)| ip)
}

/// Local LAN address, falling back to loopback
pub fn local_lan_ip() -> IpAddr {
    local_ip_address::list_afinet_netifas()
        .ok()
        .and_then(pick_lan_ip)
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// What a client needs to connect: the base URL and the password
#[derive(Debug, Clone)]
pub struct ShareInfo {
    pub url: String,
    pub password: String,
}

impl ShareInfo {
    pub fn new(ip: IpAddr, port: u16, password: impl Into<String>) -> Self {
        Self {
            url: format!("http://{}:{}", ip, port),
            password: password.into(),
        }
    }

    /// URL and password on two lines, ready to hand to a client
    pub fn connection_text(&self) -> String {
        format!("{}\n{}", self.url, self.password)
    }

    /// Terminal QR code of the URL (the password is relayed separately)
    pub fn qr_code(&self) -> anyhow::Result<String> {
        let code = QrCode::new(self.url.as_bytes())?;
        Ok(code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }
}
