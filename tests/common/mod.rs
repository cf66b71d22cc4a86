#![allow(dead_code)]

pub mod test_server {
    use std::sync::Once;
    use webobj::{RouteTable, Server, ServerConfig, ServerHandle};

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Config bound to an ephemeral loopback port.
    pub fn test_config() -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        }
    }

    pub fn start(routes: RouteTable) -> ServerHandle {
        start_server(Server::new(routes).with_config(test_config()))
    }

    pub fn start_server(server: Server) -> ServerHandle {
        setup_may_runtime();
        let handle = server.start().unwrap();
        handle.wait_ready().unwrap();
        handle
    }
}

pub mod http {
    use std::collections::HashMap;
    use std::io::{ErrorKind, Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// One parsed response.
    #[derive(Debug)]
    pub struct Reply {
        pub status: u16,
        /// Lower-cased header names.
        pub headers: HashMap<String, String>,
        pub body: Vec<u8>,
    }

    impl Reply {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).map(String::as_str)
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).to_string()
        }
    }

    pub fn connect(addr: SocketAddr) -> TcpStream {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    /// Write raw bytes and read until the server closes (or goes quiet).
    pub fn send_raw(addr: SocketAddr, req: &[u8]) -> Vec<u8> {
        let mut stream = connect(addr);
        stream.write_all(req).unwrap();
        read_to_close(&mut stream)
    }

    pub fn send_request(addr: SocketAddr, req: &str) -> String {
        String::from_utf8_lossy(&send_raw(addr, req.as_bytes())).to_string()
    }

    pub fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    break
                }
                Err(ref e) if e.kind() == ErrorKind::ConnectionReset => break,
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        buf
    }

    /// Split a single response into status, headers and body.
    pub fn parse_parts(resp: &str) -> Reply {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Reply {
            status,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    /// `GET path` with `Connection: close`.
    pub fn get(addr: SocketAddr, path: &str) -> Reply {
        parse_parts(&send_request(
            addr,
            &format!("GET {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n"),
        ))
    }

    /// A request with a body and `Connection: close`.
    pub fn with_body(addr: SocketAddr, method: &str, path: &str, body: &str) -> Reply {
        parse_parts(&send_request(
            addr,
            &format!(
                "{method} {path} HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            ),
        ))
    }
}
