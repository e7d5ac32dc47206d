//! Container format sniffing.
//!
//! Uploads are validated by magic bytes before anything touches the
//! disk; an extension check alone is trivially spoofed.

/// Known container signatures (prefix, label).
const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0x00, 0x00, 0x00, 0x1c, 0x66, 0x74, 0x79, 0x70], "mp4"),
    (&[0x00, 0x00, 0x00, 0x20, 0x66, 0x74, 0x79, 0x70], "mp4"),
    (&[0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70], "mp4"),
    (&[0x00, 0x00, 0x00, 0x14, 0x66, 0x74, 0x79, 0x70, 0x71, 0x74], "mov"),
    (&[0x00, 0x00, 0x00, 0x14, 0x66, 0x74, 0x79, 0x70], "mp4"),
    (&[0x52, 0x49, 0x46, 0x46], "avi"),
    (&[0x1a, 0x45, 0xdf, 0xa3], "mkv"),
    (&[0x46, 0x4c, 0x56, 0x01], "flv"),
    (&[0x30, 0x26, 0xb2, 0x75], "wmv"),
];

/// Sniff a container label from the first bytes of a file.
pub fn sniff_container(header: &[u8]) -> Option<&'static str> {
    if header.len() < 4 {
        return None;
    }

    for (signature, label) in SIGNATURES {
        if header.starts_with(signature) {
            return Some(label);
        }
    }

    // MP4/MOV ftyp boxes appear at varying offsets depending on the
    // box size prefix.
    if header
        .windows(4)
        .take(16)
        .any(|w| w == b"ftyp")
    {
        return Some("mp4");
    }

    None
}

/// Whether a header looks like any supported video container.
pub fn is_video_header(header: &[u8]) -> bool {
    sniff_container(header).is_some()
}
