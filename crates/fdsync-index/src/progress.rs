use std::io::{self, Read};

/// Reader that reports the running byte count after every read.
pub struct ProgressReader<R, F> {
    inner: R,
    read: u64,
    callback: F,
}

impl<R: Read, F: FnMut(u64)> ProgressReader<R, F> {
    pub fn new(inner: R, callback: F) -> Self {
        Self {
            inner,
            read: 0,
            callback,
        }
    }
}

impl<R: Read, F: FnMut(u64)> Read for ProgressReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.read += n as u64;
            (self.callback)(self.read);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_reports_cumulative_bytes() {
        let mut seen = Vec::new();
        let mut reader = ProgressReader::new(Cursor::new(vec![0u8; 10]), |n| seen.push(n));
        let mut buf = [0u8; 4];
        while reader.read(&mut buf).unwrap() > 0 {}
        drop(reader);
        assert_eq!(seen, vec![4, 8, 10]);
    }
}
