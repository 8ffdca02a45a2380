use std::fmt;
use std::net::IpAddr;

use anyhow::{Context, ensure};
use dns_parser::{Packet, RData, ResponseCode};
use pnet::packet::dns::{
    DnsClass, DnsQuery, DnsType, DnsTypes, MutableDnsPacket, Opcode, Retcode,
};
use tracing::trace;

pub const DNS_HDR_LEN: usize = 12;
pub const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    A,
    Aaaa,
    Ns,
    Mx,
    Ptr,
    Cname,
}

impl RecordKind {
    fn dns_type(self) -> DnsType {
        match self {
            RecordKind::A => DnsTypes::A,
            RecordKind::Aaaa => DnsType(28),
            RecordKind::Ns => DnsTypes::NS,
            RecordKind::Mx => DnsTypes::MX,
            RecordKind::Ptr => DnsTypes::PTR,
            RecordKind::Cname => DnsType(5),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::A => "a",
            RecordKind::Aaaa => "aaaa",
            RecordKind::Ns => "ns",
            RecordKind::Mx => "mx",
            RecordKind::Ptr => "ptr",
            RecordKind::Cname => "cname",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub kind: RecordKind,
    pub value: String,
}

/// Builds a recursive standard query for `name`.
pub fn create_query_packet(name: &str, kind: RecordKind, id: u16) -> anyhow::Result<Vec<u8>> {
    let query: DnsQuery = DnsQuery {
        qname: encode_dns_name(name)?,
        qtype: kind.dns_type(),
        qclass: DnsClass(1),
        payload: Vec::new(),
    };
    let q_fixed_len: usize = 4;
    let qlen: usize = query.qname.len() + q_fixed_len;
    let total: usize = DNS_HDR_LEN + qlen;
    let mut buffer: Vec<u8> = vec![0u8; total];

    {
        let mut dns: MutableDnsPacket =
            MutableDnsPacket::new(&mut buffer).context("creating dns header")?;
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(1);
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    // Manually Write the Query Bytes into the buffer
    let mut cursor: usize = DNS_HDR_LEN;

    buffer[cursor..cursor + query.qname.len()].copy_from_slice(&query.qname);
    cursor += query.qname.len();

    let type_bytes: [u8; 2] = query.qtype.0.to_be_bytes();
    buffer[cursor..cursor + 2].copy_from_slice(&type_bytes);
    cursor += 2;

    let class_bytes: [u8; 2] = query.qclass.0.to_be_bytes();
    buffer[cursor..cursor + 2].copy_from_slice(&class_bytes);

    Ok(buffer)
}

pub fn create_ptr_packet(ip_addr: &IpAddr, id: u16) -> anyhow::Result<Vec<u8>> {
    create_query_packet(&reverse_address_to_ptr(ip_addr), RecordKind::Ptr, id)
}

/// Extracts the answers of a response whose id matches `expected_id`.
pub fn parse_response(payload: &[u8], expected_id: u16) -> anyhow::Result<Vec<DnsRecord>> {
    let packet = Packet::parse(payload).context("failed to parse DNS response")?;
    ensure!(
        packet.header.id == expected_id,
        "unexpected transaction id {} (wanted {expected_id})",
        packet.header.id
    );
    ensure!(
        packet.header.response_code == ResponseCode::NoError
            || packet.header.response_code == ResponseCode::NameError,
        "server answered {:?}",
        packet.header.response_code
    );

    let records: Vec<DnsRecord> = packet
        .answers
        .iter()
        .filter_map(|record| match &record.data {
            RData::A(a) => Some((RecordKind::A, a.0.to_string())),
            RData::AAAA(aaaa) => Some((RecordKind::Aaaa, aaaa.0.to_string())),
            RData::NS(ns) => Some((RecordKind::Ns, ns.0.to_string())),
            RData::PTR(ptr) => Some((RecordKind::Ptr, ptr.0.to_string())),
            RData::CNAME(cname) => Some((RecordKind::Cname, cname.0.to_string())),
            RData::MX(mx) => Some((RecordKind::Mx, format!("{} {}", mx.preference, mx.exchange))),
            _ => {
                trace!("skipping unsupported answer for {}", record.name);
                None
            }
        })
        .map(|(kind, value)| DnsRecord { kind, value })
        .collect();

    Ok(records)
}

/// `1.2.3.4` becomes `4.3.2.1.in-addr.arpa`, IPv6 uses reversed nibbles under `ip6.arpa`.
pub fn reverse_address_to_ptr(ip_addr: &IpAddr) -> String {
    match ip_addr {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa")
        }
        IpAddr::V6(v6) => {
            let mut labels: Vec<String> = Vec::with_capacity(33);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0f));
                labels.push(format!("{:x}", byte >> 4));
            }
            labels.push("ip6.arpa".to_string());
            labels.join(".")
        }
    }
}

fn encode_dns_name(name: &str) -> anyhow::Result<Vec<u8>> {
    let mut encoded: Vec<u8> = Vec::new();
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        ensure!(label.len() <= 63, "label '{label}' exceeds 63 bytes");
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    ensure!(encoded.len() <= 255, "name '{name}' exceeds 255 bytes");
    Ok(encoded)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
