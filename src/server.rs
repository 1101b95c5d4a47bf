//! Blocking TCP server exposing the line protocol from §6: `R:phy,dev,reg`
//! / `W:phy,dev,reg,val`, all hex, one connection per thread, all
//! connections serialized onto the one shared `MdioContext`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::mdio::{slow, MdioContext};
use crate::transport::MpsseTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdioServerRequest {
    Read { phy: u8, dev: u8, reg: u16 },
    Write { phy: u8, dev: u8, reg: u16, val: u16 },
}

fn parse_hex(field: &str) -> Option<u32> {
    u32::from_str_radix(field.trim(), 16).ok()
}

/// Parse one line of the request protocol: a leading `R:`/`W:` (case
/// insensitive), then comma-separated hex fields.
pub fn parse_request(line: &str) -> Result<MdioServerRequest> {
    let line = line.trim();
    let (kind, rest) = line.split_once(':').ok_or(Error::ServerProtocol(
        "missing ':' after request kind",
    ))?;

    let fields: Vec<&str> = rest.split(',').collect();
    match kind.to_ascii_uppercase().as_str() {
        "R" => {
            if fields.len() != 3 {
                return Err(Error::ServerProtocol("R: requires phy,dev,reg"));
            }
            let phy = parse_hex(fields[0]).ok_or(Error::ServerProtocol("bad phy field"))? as u8;
            let dev = parse_hex(fields[1]).ok_or(Error::ServerProtocol("bad dev field"))? as u8;
            let reg = parse_hex(fields[2]).ok_or(Error::ServerProtocol("bad reg field"))? as u16;
            Ok(MdioServerRequest::Read { phy, dev, reg })
        }
        "W" => {
            if fields.len() != 4 {
                return Err(Error::ServerProtocol("W: requires phy,dev,reg,val"));
            }
            let phy = parse_hex(fields[0]).ok_or(Error::ServerProtocol("bad phy field"))? as u8;
            let dev = parse_hex(fields[1]).ok_or(Error::ServerProtocol("bad dev field"))? as u8;
            let reg = parse_hex(fields[2]).ok_or(Error::ServerProtocol("bad reg field"))? as u16;
            let val = parse_hex(fields[3]).ok_or(Error::ServerProtocol("bad val field"))? as u16;
            Ok(MdioServerRequest::Write { phy, dev, reg, val })
        }
        _ => Err(Error::ServerProtocol("unknown request kind")),
    }
}

pub fn format_response(request: &MdioServerRequest, read_result: Option<u16>) -> String {
    match request {
        MdioServerRequest::Read { .. } => {
            format!("R Done: 0x{:04x}", read_result.unwrap_or(0))
        }
        MdioServerRequest::Write { .. } => "W Done".to_string(),
    }
}

fn handle_request<T: MpsseTransport>(
    ctx: &Mutex<MdioContext<T>>,
    request: &MdioServerRequest,
) -> Result<String> {
    let mut ctx = ctx.lock().expect("MDIO context mutex poisoned");
    match *request {
        MdioServerRequest::Read { phy, dev, reg } => {
            let saved = ctx.phy_id;
            ctx.phy_id = phy;
            let val = slow::mdio_read(&mut ctx, dev, reg);
            ctx.phy_id = saved;
            Ok(format_response(request, Some(val?)))
        }
        MdioServerRequest::Write { phy, dev, reg, val } => {
            let saved = ctx.phy_id;
            ctx.phy_id = phy;
            let result = slow::mdio_write(&mut ctx, dev, reg, val);
            ctx.phy_id = saved;
            result?;
            Ok(format_response(request, None))
        }
    }
}

fn serve_connection<T: MpsseTransport>(ctx: Arc<Mutex<MdioContext<T>>>, stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(e) => {
            log::error!("mdio server: failed to clone stream for {peer}: {e}");
            return;
        }
    };
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("mdio server: read error from {peer}: {e}");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        let reply = match parse_request(&line).and_then(|req| handle_request(&ctx, &req)) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("mdio server: bad request from {peer}: {e}");
                format!("Error: {e}")
            }
        };
        if writeln!(writer, "{reply}").is_err() {
            break;
        }
    }
}

/// Run the blocking accept loop. Returns immediately (without binding) if
/// `port` is the literal sentinel `"disabled"`, matching
/// `mdio_service_init`'s check.
pub fn serve<T: MpsseTransport + Send + 'static>(
    ctx: Arc<Mutex<MdioContext<T>>>,
    port: &str,
) -> Result<()> {
    if port == "disabled" {
        log::info!("mdio server disabled by configuration");
        return Ok(());
    }
    let port_num: u16 = port
        .parse()
        .map_err(|_| Error::ServerProtocol("port must be numeric or \"disabled\""))?;
    let listener = TcpListener::bind(("0.0.0.0", port_num)).map_err(|_| Error::InitFailed)?;

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || serve_connection(ctx, stream));
            }
            Err(e) => log::warn!("mdio server: accept failed: {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_request_case_insensitively() {
        assert_eq!(
            parse_request("R:1a,1f,10").unwrap(),
            MdioServerRequest::Read {
                phy: 0x1a,
                dev: 0x1f,
                reg: 0x10
            }
        );
    }

    #[test]
    fn parses_write_request_case_insensitively() {
        assert_eq!(
            parse_request("w:1A,1F,0010,00AB").unwrap(),
            MdioServerRequest::Write {
                phy: 0x1a,
                dev: 0x1f,
                reg: 0x10,
                val: 0xab,
            }
        );
    }

    #[test]
    fn rejects_request_missing_fields() {
        assert!(parse_request("R:1a,1f").is_err());
    }

    #[test]
    fn rejects_unknown_leading_letter() {
        assert!(parse_request("X:1a,1f,10").is_err());
    }

    #[test]
    fn format_response_matches_wire_text() {
        let req = MdioServerRequest::Read {
            phy: 0,
            dev: 0,
            reg: 0,
        };
        assert_eq!(format_response(&req, Some(0x1234)), "R Done: 0x1234");
        let req = MdioServerRequest::Write {
            phy: 0,
            dev: 0,
            reg: 0,
            val: 0,
        };
        assert_eq!(format_response(&req, None), "W Done");
    }
}
