use base64::{engine::general_purpose::STANDARD, Engine as _};
use filecoin_construction::message::{MalformedMessageError, MessageJson};
use filecoin_construction::signature::SignatureType;
use filecoin_construction::{
    Address, Message, Network, Signature, SignedMessage, TokenAmount, U256,
};
use rand::Rng;
use rustc_hex::FromHex;

fn decode_hex(hex: &str) -> Vec<u8> {
    hex.from_hex().unwrap()
}

const FROM: &str = "t1d2xrzcslx7xlbbylc5c3d5lvandqw4iwl6epxba";
const TO: &str = "t17uoq6tp427uzv7fztkbsnn64iwotfrristwpryy";
const SIGNATURE: &str =
    "nFuTI7MxEXqTQ0QmmQTmqbUsNZfHFXlNjz+susVDkAk1SrRCdJKxlVZZrM4vUtVBSYgtMIeigNfpqdKGIFhoWQA=";

macro_rules! payment {
    () => {
        Message {
            version: 0,
            to: TO.parse().unwrap(),
            from: FROM.parse().unwrap(),
            nonce: 1,
            value: TokenAmount::from(100_000),
            gas_limit: 25000,
            gas_fee_cap: TokenAmount::from(1),
            gas_premium: TokenAmount::from(1),
            method: 0,
            params: vec![],
        }
    };
}

fn signed_payment() -> SignedMessage {
    SignedMessage {
        message: payment!(),
        signature: Signature::new(SignatureType::Secp256k1, STANDARD.decode(SIGNATURE).unwrap())
            .unwrap(),
    }
}

#[test]
fn test_encode() {
    let bytes = payment!().to_cbor().unwrap();
    assert_eq!(
        STANDARD.encode(&bytes),
        "igBVAf0dD0381+ma/Lmagya33EWdMsYoVQEerxyKS7/usIcLF0Wx9XUDRwtxFgFEAAGGoBlhqEIAAUIAAQBA"
    );
    assert_eq!(Message::from_cbor(&bytes).unwrap(), payment!());
}

#[test]
fn test_decode_known_bytes() {
    let bytes = decode_hex("8A005501FD1D0F4DFCD7E99AFCB99A8326B7DC459D32C6285501B882619D46558F3D9E316D11B48DCF211327025A0144000186A01961A84200014200010040");
    let message = Message::from_cbor(&bytes)
        .unwrap()
        .with_network(Network::Testnet);
    assert_eq!(message.to.to_string(), TO);
    assert_eq!(
        message.from.to_string(),
        "t1xcbgdhkgkwht3hrrnui3jdopeejsoas2rujnkdi"
    );
    assert_eq!(message.value, TokenAmount::from(100_000));
    assert_eq!(message.gas_limit, 25000);
    assert_eq!(message.method, 0);
    assert!(message.params.is_empty());
    assert_eq!(message.to_cbor().unwrap(), bytes);
}

#[test]
fn test_decode_rejects() {
    let bytes = payment!().to_cbor().unwrap();

    let mut trailing = bytes.clone();
    trailing.push(0x00);
    assert!(matches!(
        Message::from_cbor(&trailing).unwrap_err(),
        MalformedMessageError::Encoding(_)
    ));

    let mut short = bytes.clone();
    short[0] = 0x89;
    assert_eq!(
        Message::from_cbor(&short).unwrap_err(),
        MalformedMessageError::ArityMismatch {
            expected: 10,
            got: 9
        }
    );

    assert!(matches!(
        Message::from_cbor(&bytes[..bytes.len() - 1]).unwrap_err(),
        MalformedMessageError::Encoding(_)
    ));

    // Nonce 1 written as a two-byte integer.
    let mut wide = bytes[..47].to_vec();
    assert_eq!(wide[46], 0x01);
    wide[46] = 0x18;
    wide.push(0x01);
    wide.extend_from_slice(&bytes[47..]);
    assert!(matches!(
        Message::from_cbor(&wide).unwrap_err(),
        MalformedMessageError::Encoding(_)
    ));
}

#[test]
fn test_decode_rejects_bad_amounts() {
    let bytes = payment!().to_cbor().unwrap();
    // Value is `44 00 01 86 a0` right after the nonce.
    assert_eq!(&bytes[47..52], &[0x44, 0x00, 0x01, 0x86, 0xa0]);

    let mut negative = bytes.clone();
    negative[48] = 0x01;
    assert!(matches!(
        Message::from_cbor(&negative).unwrap_err(),
        MalformedMessageError::Encoding(_)
    ));

    let mut padded = bytes[..47].to_vec();
    padded.extend_from_slice(&[0x45, 0x00, 0x00, 0x01, 0x86, 0xa0]);
    padded.extend_from_slice(&bytes[52..]);
    assert!(matches!(
        Message::from_cbor(&padded).unwrap_err(),
        MalformedMessageError::Encoding(_)
    ));
}

#[test]
fn test_decode_rejects_bad_address() {
    let mut bytes = payment!().to_cbor().unwrap();
    // Protocol byte of `To`.
    assert_eq!(bytes[3], 0x01);
    bytes[3] = 0x09;
    assert!(matches!(
        Message::from_cbor(&bytes).unwrap_err(),
        MalformedMessageError::Encoding(_)
    ));
}

#[test]
fn test_json() {
    let json = payment!().with_network(Network::Testnet).to_json().unwrap();
    assert_eq!(
        json,
        r#"{"Version":0,"To":"t17uoq6tp427uzv7fztkbsnn64iwotfrristwpryy","From":"t1d2xrzcslx7xlbbylc5c3d5lvandqw4iwl6epxba","Nonce":1,"Value":"100000","GasLimit":25000,"GasFeeCap":"1","GasPremium":"1","Method":0,"Params":""}"#
    );
    assert_eq!(Message::from_json(&json).unwrap(), payment!());

    let without_version = json.replace(r#""Version":0,"#, "");
    assert_eq!(Message::from_json(&without_version).unwrap(), payment!());

    let wrong_version = json.replace(r#""Version":0"#, r#""Version":1"#);
    assert_eq!(
        Message::from_json(&wrong_version).unwrap_err(),
        MalformedMessageError::UnsupportedVersion(1)
    );
    assert!(matches!(
        Message::from_json(r#"{"To":"t01"}"#).unwrap_err(),
        MalformedMessageError::Json(_)
    ));
}

#[test]
fn test_json_view() {
    let view = MessageJson::from(&payment!());
    assert_eq!(view.params, Some(vec![]));
    let message: Message = view.try_into().unwrap();
    assert_eq!(message, payment!());
}

#[test]
fn test_signed_message_cbor() {
    let signed = signed_payment();
    let bytes = signed.to_cbor().unwrap();
    assert_eq!(bytes[0], 0x82);
    assert_eq!(SignedMessage::from_cbor(&bytes).unwrap(), signed);
    assert_eq!(
        signed.cid().unwrap().to_string(),
        "bafy2bzaceb7vllktor65s6ng4ongqpstubbvq7c46se57z4nwuohq54puq4do"
    );

    assert!(matches!(
        SignedMessage::from_cbor(&payment!().to_cbor().unwrap()).unwrap_err(),
        MalformedMessageError::ArityMismatch {
            expected: 2,
            got: 10
        }
    ));
}

#[test]
fn test_signed_message_json() {
    let signed = signed_payment().with_network(Network::Testnet);
    let json = signed.to_json().unwrap();
    assert!(json.starts_with(r#"{"Message":{"Version":0,"To":"t17uoq"#));
    assert!(json.ends_with(&format!(r#""Signature":{{"Type":1,"Data":"{SIGNATURE}"}}}}"#)));
    assert_eq!(SignedMessage::from_json(&json).unwrap(), signed);

    let truncated = json.replace(SIGNATURE, "AAAA");
    assert!(matches!(
        SignedMessage::from_json(&truncated).unwrap_err(),
        MalformedMessageError::Signature(_)
    ));
}

#[test]
fn test_cid() {
    assert_eq!(
        payment!().cid().unwrap().to_string(),
        "bafy2bzaceduq6pnkpz7xhs6d24epnu47hjpn3oucoq3xnkc4g5b7hgcdw4now"
    );
    let addresses_only_network = payment!().with_network(Network::Mainnet);
    assert_eq!(
        addresses_only_network.cid().unwrap(),
        payment!().cid().unwrap()
    );
}

#[test]
fn test_id_addresses() {
    let mut message = payment!();
    message.to = Address::new_id(Network::Testnet, 1002);
    let bytes = message.to_cbor().unwrap();
    assert_eq!(&bytes[2..6], &[0x43, 0x00, 0xea, 0x07]);
    assert_eq!(Message::from_cbor(&bytes).unwrap(), message);
}

fn random_bytes(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen()).collect()
}

fn random_address(rng: &mut impl Rng) -> Address {
    let network = Network::Testnet;
    match rng.gen_range(0..4) {
        0 => Address::new_id(network, rng.gen()),
        1 => Address::new_actor(network, &random_bytes(rng, 32)),
        2 => Address::new_bls(network, &random_bytes(rng, 48)).unwrap(),
        _ => {
            let len = rng.gen_range(0..=54);
            Address::new_delegated(network, rng.gen(), &random_bytes(rng, len)).unwrap()
        }
    }
}

fn random_amount(rng: &mut impl Rng) -> TokenAmount {
    // Mix of zero, small and full-width amounts.
    let len = rng.gen_range(0..=32);
    TokenAmount::from(U256::from_big_endian(&random_bytes(rng, len)))
}

#[test]
fn test_random_round_trip() {
    let mut rng = rand::thread_rng();
    for _ in 0..256 {
        let params_len = rng.gen_range(0..300);
        let message = Message {
            version: 0,
            to: random_address(&mut rng),
            from: random_address(&mut rng),
            nonce: rng.gen(),
            value: random_amount(&mut rng),
            gas_limit: rng.gen(),
            gas_fee_cap: random_amount(&mut rng),
            gas_premium: random_amount(&mut rng),
            method: rng.gen(),
            params: random_bytes(&mut rng, params_len),
        };
        let bytes = message.to_cbor().unwrap();
        assert_eq!(Message::from_cbor(&bytes).unwrap(), message);
        assert_eq!(Message::from_json(&message.to_json().unwrap()).unwrap(), message);
        assert_eq!(
            Message::from_cbor(&bytes).unwrap().cid().unwrap(),
            message.cid().unwrap()
        );

        let signed = SignedMessage {
            message,
            signature: Signature::new(SignatureType::Secp256k1, random_bytes(&mut rng, 65))
                .unwrap(),
        };
        assert_eq!(
            SignedMessage::from_cbor(&signed.to_cbor().unwrap()).unwrap(),
            signed
        );
        assert_eq!(
            SignedMessage::from_json(&signed.to_json().unwrap()).unwrap(),
            signed
        );
    }
}
