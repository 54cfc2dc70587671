//! Exchange over a real TCP socket, with a minimal forwarder stand-in on
//! the other end.

use rust_ndn_common::ndn::{Data, Interest, Name, SignatureInfo, SignatureType};
use rust_ndn_face::transport::TcpTransport;
use rust_ndn_face::Face;
use std::cell::Cell;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::thread;

/// Reads one small TLV element (1-byte type, 1-byte length) off the socket.
fn read_small_element(socket: &mut std::net::TcpStream) -> Vec<u8> {
    let mut header = [0u8; 2];
    socket.read_exact(&mut header).unwrap();
    let mut value = vec![0u8; header[1] as usize];
    socket.read_exact(&mut value).unwrap();
    let mut element = header.to_vec();
    element.extend_from_slice(&value);
    element
}

#[test]
fn tcp_interest_data_exchange() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let element = read_small_element(&mut socket);
        assert_eq!(element[0], 0x05); // an Interest arrived

        let interest = Interest::decode(element.into()).unwrap();
        let mut data = Data::new(interest.name().clone(), "over tcp");
        data.set_signature(
            SignatureInfo {
                signature_type: SignatureType::DigestSha256,
                key_locator: None,
            },
            vec![0u8; 32],
        );
        socket.write_all(&data.encode().unwrap()).unwrap();
        interest.name().to_string()
    });

    let face = Face::with_transport(Rc::new(TcpTransport::new("127.0.0.1", port)));

    let received = Rc::new(Cell::new(false));
    let received2 = received.clone();
    face.express_interest(
        Interest::new(Name::from_string("/test/tcp").unwrap()).with_lifetime(2000),
        Some(Box::new(move |_, data| {
            assert_eq!(data.content().as_ref(), b"over tcp");
            received2.set(true);
        })),
        Some(Box::new(|_, _| panic!("unexpected nack"))),
        Some(Box::new(|_| panic!("interest timed out"))),
    )
    .unwrap();

    // returns once the Data satisfied the Interest and the tables drained
    face.process_events(None, false);

    assert!(received.get());
    assert_eq!(server.join().unwrap(), "/test/tcp");
    face.shutdown();
    face.process_events(None, false);
}
