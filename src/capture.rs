//! Capture reading: pull UDP datagrams out of pcap and pcapng files.
//!
//! Supports Ethernet (with 802.1Q/802.1ad tags), raw IP and Linux cooked (SLL) link
//! types, IPv4 only. Payload lengths come from the IPv4/UDP length fields so that
//! Ethernet padding on short frames is never handed to the decoder.

use pcap_parser::pcapng::Block as PcapNgBlock;
use pcap_parser::traits::{PcapNGPacketBlock, PcapReaderIterator};
use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READER_BUFFER: usize = 1 << 20;
const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;
const IPPROTO_UDP: u8 = 17;
const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{format} read error: {reason}")]
    Format { format: &'static str, reason: String },
}

/// One UDP datagram found in a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

impl UdpDatagram<'_> {
    pub fn involves_port(&self, port: u16) -> bool {
        self.src_port == port || self.dst_port == port
    }
}

/// Frame and datagram totals of one capture pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCounts {
    pub frames: u64,
    pub udp_datagrams: u64,
}

/// Extract the UDP datagram carried by a captured frame, if any.
pub fn udp_from_linktype(linktype: Linktype, frame: &[u8]) -> Option<UdpDatagram<'_>> {
    let l3 = match linktype.0 {
        1 => ethernet_l3(frame)?,
        101 | 228 => frame,
        113 => linux_sll_l3(frame)?,
        _ => return None,
    };
    ipv4_udp(l3)
}

fn be16(b: &[u8], at: usize) -> Option<u16> {
    let s = b.get(at..at + 2)?;
    Some(u16::from_be_bytes([s[0], s[1]]))
}

fn ethernet_l3(frame: &[u8]) -> Option<&[u8]> {
    let mut off = 12;
    let mut ethertype = be16(frame, off)?;
    off += 2;
    // Each tag is a 2-byte TCI followed by the next ethertype.
    while ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ {
        ethertype = be16(frame, off + 2)?;
        off += 4;
    }
    match ethertype {
        ETHERTYPE_IPV4 => frame.get(off..),
        _ => None,
    }
}

fn linux_sll_l3(frame: &[u8]) -> Option<&[u8]> {
    match be16(frame, 14)? {
        ETHERTYPE_IPV4 => frame.get(16..),
        _ => None,
    }
}

fn ipv4_udp(l3: &[u8]) -> Option<UdpDatagram<'_>> {
    let ver_ihl = *l3.first()?;
    if ver_ihl >> 4 != 4 {
        return None;
    }
    let ihl = (ver_ihl & 0x0f) as usize * 4;
    let total_len = be16(l3, 2)? as usize;
    if ihl < 20 || total_len < ihl || l3.len() < ihl {
        return None;
    }
    let l3 = if total_len <= l3.len() { &l3[..total_len] } else { l3 };
    if *l3.get(9)? != IPPROTO_UDP {
        return None;
    }
    let udp = &l3[ihl..];
    let udp_len = be16(udp, 4)? as usize;
    if udp_len < UDP_HEADER_LEN || udp.len() < udp_len {
        return None;
    }
    Some(UdpDatagram {
        src_port: be16(udp, 0)?,
        dst_port: be16(udp, 2)?,
        payload: &udp[UDP_HEADER_LEN..udp_len],
    })
}

/// Open a pcap or pcapng file (told apart by its magic) and feed every UDP datagram to
/// `f` together with its 1-based frame number.
pub fn for_each_udp_datagram<F>(path: &Path, f: F) -> Result<CaptureCounts, CaptureError>
where
    F: FnMut(u64, UdpDatagram<'_>),
{
    let mut probe = [0u8; 4];
    File::open(path)?.read_exact(&mut probe)?;
    let file = File::open(path)?;
    if probe == PCAPNG_MAGIC {
        read_pcapng(file, f)
    } else {
        read_legacy_pcap(file, f)
    }
}

pub fn read_legacy_pcap<R, F>(input: R, mut f: F) -> Result<CaptureCounts, CaptureError>
where
    R: Read,
    F: FnMut(u64, UdpDatagram<'_>),
{
    let mut reader = pcap_parser::pcap::LegacyPcapReader::new(READER_BUFFER, input)
        .map_err(|e| format_error("pcap", e))?;
    let mut counts = CaptureCounts::default();
    let mut linktype = Linktype(1);
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(h) => linktype = h.network,
                    PcapBlockOwned::Legacy(b) => {
                        counts.frames += 1;
                        if let Some(dgram) = udp_from_linktype(linktype, b.data) {
                            counts.udp_datagrams += 1;
                            f(counts.frames, dgram);
                        }
                    }
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => reader.refill().map_err(|e| format_error("pcap", e))?,
            Err(e) => return Err(format_error("pcap", e)),
        }
    }
    Ok(counts)
}

pub fn read_pcapng<R, F>(input: R, mut f: F) -> Result<CaptureCounts, CaptureError>
where
    R: Read,
    F: FnMut(u64, UdpDatagram<'_>),
{
    let mut reader =
        pcap_parser::pcapng::PcapNGReader::new(READER_BUFFER, input).map_err(|e| format_error("pcapng", e))?;
    let mut counts = CaptureCounts::default();
    let mut if_linktypes: Vec<Linktype> = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::NG(b) = block {
                    let packet = match &b {
                        PcapNgBlock::InterfaceDescription(idb) => {
                            if_linktypes.push(idb.linktype);
                            None
                        }
                        PcapNgBlock::EnhancedPacket(epb) => {
                            let lt = if_linktypes.get(epb.if_id as usize).copied().unwrap_or(Linktype(1));
                            Some((lt, epb.packet_data()))
                        }
                        PcapNgBlock::SimplePacket(spb) => {
                            let lt = if_linktypes.first().copied().unwrap_or(Linktype(1));
                            Some((lt, spb.packet_data()))
                        }
                        _ => None,
                    };
                    if let Some((lt, frame)) = packet {
                        counts.frames += 1;
                        if let Some(dgram) = udp_from_linktype(lt, frame) {
                            counts.udp_datagrams += 1;
                            f(counts.frames, dgram);
                        }
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => reader.refill().map_err(|e| format_error("pcapng", e))?,
            Err(e) => return Err(format_error("pcapng", e)),
        }
    }
    Ok(counts)
}

fn format_error<I: std::fmt::Debug>(format: &'static str, e: PcapError<I>) -> CaptureError {
    CaptureError::Format { format, reason: format!("{:?}", e) }
}
