//! Trust Anchor Locators

use std::fmt;
use std::fs::{read_dir, DirEntry, File, ReadDir};
use std::io::{self, Read};
use std::path::Path;
use log::{debug, error};
use super::ber;
use super::cert::SubjectPublicKeyInfo;
use super::rsync;


//------------ Tal -----------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Tal {
    name: String,
    uris: Vec<rsync::Uri>,
    key_info: SubjectPublicKeyInfo,
}

impl Tal {
    pub fn read_dir<P: AsRef<Path>>(path: P) -> Result<TalIter, io::Error> {
        read_dir(path).map(TalIter)
    }

    pub fn read<R: Read>(name: String, reader: &mut R) -> Result<Self, ReadError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let mut data = data.as_ref();
        let mut uris = Vec::new();
        while let Some(uri) = Self::take_uri(&mut data)? {
            uris.push(uri)
        }
        let key_info = base64::decode_config(data, base64::MIME)?;
        let key_info = SubjectPublicKeyInfo::decode(key_info.as_ref())?;
        Ok(Tal { name, uris, key_info })
    }

    fn take_uri(data: &mut &[u8]) -> Result<Option<rsync::Uri>, ReadError> {
        let mut split = data.splitn(2, |&ch| ch == b'\n');
        let mut line = split.next().ok_or(ReadError::UnexpectedEof)?;
        *data = split.next().ok_or(ReadError::UnexpectedEof)?;
        if line.ends_with(b"\r") {
            line = line.split_last().unwrap().1;
        }
        if line.is_empty() {
            Ok(None)
        }
        else {
            Ok(Some(rsync::Uri::from_slice(line)?))
        }
    }
}

impl Tal {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uris(&self) -> ::std::slice::Iter<rsync::Uri> {
        self.uris.iter()
    }

    pub fn key_info(&self) -> &SubjectPublicKeyInfo {
        &self.key_info
    }
}


//------------ TalIter -------------------------------------------------------

pub struct TalIter(ReadDir);

impl Iterator for TalIter {
    type Item = Result<Tal, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.0.next() {
                Some(Ok(entry)) => {
                    match next_entry(entry) {
                        Ok(Some(res)) => return Some(Ok(res)),
                        Ok(None) => { },
                        Err(err) => {
                            error!("Bad trust anchor {}", err);
                            return Some(Err(err))
                        }
                    }
                }
                Some(Err(err)) => return Some(Err(err.into())),
                None => return None
            };
        }
    }
}

fn next_entry(entry: DirEntry) -> Result<Option<Tal>, ReadError> {
    if !entry.file_type()?.is_file() {
        return Ok(None)
    }
    let path = entry.path();
    debug!("Processing TAL {}", path.display());
    let name = path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Tal::read(name, &mut File::open(path)?).map(Some)
}


//------------ ReadError -----------------------------------------------------

#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    UnexpectedEof,
    BadUri(rsync::UriError),
    BadKeyInfoEncoding(base64::DecodeError),
    BadKeyInfo(ber::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadError::Io(err) => write!(f, "{}", err),
            ReadError::UnexpectedEof => write!(f, "unexpected end of file"),
            ReadError::BadUri(err) => {
                write!(f, "bad trust anchor URI: {}", err)
            }
            ReadError::BadKeyInfoEncoding(err) => {
                write!(f, "bad key info: {}", err)
            }
            ReadError::BadKeyInfo(err) => write!(f, "bad key info: {}", err),
        }
    }
}

impl std::error::Error for ReadError { }

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> ReadError {
        ReadError::Io(err)
    }
}

impl From<rsync::UriError> for ReadError {
    fn from(err: rsync::UriError) -> ReadError {
        ReadError::BadUri(err)
    }
}

impl From<base64::DecodeError> for ReadError {
    fn from(err: base64::DecodeError) -> ReadError {
        ReadError::BadKeyInfoEncoding(err)
    }
}

impl From<ber::Error> for ReadError {
    fn from(err: ber::Error) -> ReadError {
        ReadError::BadKeyInfo(err)
    }
}

