//! LZ-String codec, base64 flavour.
//!
//! Trimps exports its save as `LZString.compressToBase64(JSON.stringify(game))`.
//! The stream works on UTF-16 code units, so both directions go through
//! `Vec<u16>` rather than `char`.

use std::collections::{HashMap, HashSet};

use crate::collector_error::CollectorError;

const KEY_STR_BASE64: &[u8; 65] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

const BITS_PER_CHAR: u32 = 6;
const RESET_VALUE: u32 = 32;

fn base_value(c: u8) -> Option<u32> {
    KEY_STR_BASE64
        .iter()
        .position(|k| *k == c)
        .map(|position| position as u32)
}

macro_rules! invalid {
    ($($arg:tt)*) => {
        anyhow::bail!(CollectorError::InvalidLzString {
            reason: format!($($arg)*)
        })
    };
}

struct BitWriter {
    value: u32,
    position: u32,
    output: Vec<u8>,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            value: 0,
            position: 0,
            output: Vec::new(),
        }
    }

    /// Writes `bits` bits of `value`, least significant first.
    fn write(&mut self, mut value: u32, bits: u32) {
        for _ in 0..bits {
            self.value = (self.value << 1) | (value & 1);
            if self.position == BITS_PER_CHAR - 1 {
                self.position = 0;
                self.output.push(KEY_STR_BASE64[self.value as usize]);
                self.value = 0;
            } else {
                self.position += 1;
            }
            value >>= 1;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        loop {
            self.value <<= 1;
            if self.position == BITS_PER_CHAR - 1 {
                self.output.push(KEY_STR_BASE64[self.value as usize]);
                break;
            }
            self.position += 1;
        }
        self.output
    }
}

struct Compressor {
    writer: BitWriter,
    dictionary: HashMap<Vec<u16>, u32>,
    dictionary_to_create: HashSet<Vec<u16>>,
    dict_size: u32,
    num_bits: u32,
    enlarge_in: u32,
}

impl Compressor {
    fn enlarge(&mut self) {
        self.enlarge_in -= 1;
        if self.enlarge_in == 0 {
            self.enlarge_in = 1 << self.num_bits;
            self.num_bits += 1;
        }
    }

    fn emit(&mut self, w: &[u16]) {
        if self.dictionary_to_create.remove(w) {
            let unit = u32::from(w[0]);
            if unit < 256 {
                self.writer.write(0, self.num_bits);
                self.writer.write(unit, 8);
            } else {
                self.writer.write(1, self.num_bits);
                self.writer.write(unit, 16);
            }
            self.enlarge();
        } else {
            let code = self.dictionary[w];
            self.writer.write(code, self.num_bits);
        }
        self.enlarge();
    }
}

pub fn compress_to_base64(input: &str) -> String {
    let mut compressor = Compressor {
        writer: BitWriter::new(),
        dictionary: HashMap::new(),
        dictionary_to_create: HashSet::new(),
        dict_size: 3,
        num_bits: 2,
        // The first entry does not count towards enlarging.
        enlarge_in: 2,
    };

    let mut w: Vec<u16> = Vec::new();
    for unit in input.encode_utf16() {
        let c = vec![unit];
        if !compressor.dictionary.contains_key(&c) {
            compressor.dictionary.insert(c.clone(), compressor.dict_size);
            compressor.dict_size += 1;
            compressor.dictionary_to_create.insert(c.clone());
        }

        let mut wc = w.clone();
        wc.push(unit);
        if compressor.dictionary.contains_key(&wc) {
            w = wc;
        } else {
            compressor.emit(&w);
            compressor.dictionary.insert(wc, compressor.dict_size);
            compressor.dict_size += 1;
            w = c;
        }
    }

    if !w.is_empty() {
        compressor.emit(&w);
    }

    compressor.writer.write(2, compressor.num_bits);
    let mut output = compressor.writer.finish();
    while output.len() % 4 != 0 {
        output.push(b'=');
    }
    // Every byte comes from the base64 key string.
    output.into_iter().map(char::from).collect()
}

struct BitReader<'a> {
    input: &'a [u8],
    value: u32,
    position: u32,
    index: usize,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        BitReader {
            input,
            value: Self::value_at(input, 0),
            position: RESET_VALUE,
            index: 1,
        }
    }

    fn value_at(input: &[u8], index: usize) -> u32 {
        input
            .get(index)
            .and_then(|c| base_value(*c))
            .unwrap_or(0)
    }

    fn read(&mut self, bits: u32) -> u32 {
        let mut result = 0;
        for bit in 0..bits {
            let set = self.value & self.position;
            self.position >>= 1;
            if self.position == 0 {
                self.position = RESET_VALUE;
                self.value = Self::value_at(self.input, self.index);
                self.index += 1;
            }
            if set > 0 {
                result |= 1 << bit;
            }
        }
        result
    }

    fn exhausted(&self) -> bool {
        self.index > self.input.len()
    }
}

pub fn decompress_from_base64(input: &str) -> anyhow::Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(String::new());
    }
    if let Some(bad) = input.bytes().find(|c| base_value(*c).is_none()) {
        invalid!("unexpected character {:?}", char::from(bad));
    }

    let mut reader = BitReader::new(input.as_bytes());
    // Codes 0..=2 are reserved for literals and the end marker.
    let mut dictionary: Vec<Vec<u16>> = vec![Vec::new(), Vec::new(), Vec::new()];
    let mut enlarge_in: u32 = 4;
    let mut num_bits: u32 = 3;

    let first = match reader.read(2) {
        0 => reader.read(8) as u16,
        1 => reader.read(16) as u16,
        2 => return Ok(String::new()),
        code => invalid!("unexpected leading code {}", code),
    };
    let mut w = vec![first];
    dictionary.push(w.clone());
    let mut result = w.clone();

    loop {
        if reader.exhausted() {
            invalid!("stream ended without an end marker");
        }

        let mut code = reader.read(num_bits) as usize;
        match code {
            0 | 1 => {
                let literal = if code == 0 {
                    reader.read(8)
                } else {
                    reader.read(16)
                };
                dictionary.push(vec![literal as u16]);
                code = dictionary.len() - 1;
                enlarge_in -= 1;
            }
            2 => break,
            _ => {}
        }

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }

        let entry = if code < dictionary.len() {
            dictionary[code].clone()
        } else if code == dictionary.len() {
            let mut entry = w.clone();
            entry.push(w[0]);
            entry
        } else {
            invalid!("reference to unknown dictionary entry {}", code);
        };

        result.extend_from_slice(&entry);
        let mut next = w;
        next.push(entry[0]);
        dictionary.push(next);
        enlarge_in -= 1;
        w = entry;

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }
    }

    Ok(
        String::from_utf16(&result).map_err(|err| CollectorError::InvalidLzString {
            reason: err.to_string(),
        })?,
    )
}
