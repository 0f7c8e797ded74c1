//! SGR coalescing
//!
//! Merges runs of adjacent `ESC [ ... m` sequences into one and writes the
//! bare reset `ESC [ m` as `ESC [ 0 m`. Everything else passes through.

/// Parse an SGR sequence at the start of `bytes`, returning its parameter
/// bytes and total length
fn parse_sgr(bytes: &[u8]) -> Option<(&[u8], usize)> {
    if bytes.len() < 3 || bytes[0] != 0x1b || bytes[1] != b'[' {
        return None;
    }
    let body = &bytes[2..];
    let end = body
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b';' || *b == b':'))?;
    (body[end] == b'm').then(|| (&body[..end], end + 3))
}

/// Coalesce adjacent SGR sequences in `input`
pub fn coalesce(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut params: Vec<u8> = Vec::new();
    let mut in_run = false;
    let mut pos = 0;

    while pos < input.len() {
        if let Some((p, len)) = parse_sgr(&input[pos..]) {
            if in_run {
                params.push(b';');
            }
            if p.is_empty() {
                params.push(b'0');
            } else {
                params.extend_from_slice(p);
            }
            in_run = true;
            pos += len;
            continue;
        }
        if in_run {
            flush_run(&mut out, &mut params);
            in_run = false;
        }
        out.push(input[pos]);
        pos += 1;
    }
    if in_run {
        flush_run(&mut out, &mut params);
    }
    out
}

fn flush_run(out: &mut Vec<u8>, params: &mut Vec<u8>) {
    out.extend_from_slice(b"\x1b[");
    out.append(params);
    out.push(b'm');
}
