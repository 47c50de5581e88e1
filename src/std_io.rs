use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::fio::Transport;
use crate::stream::BufferedStream;

impl<T: Transport> Read for BufferedStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BufferedStream::read(self, buf).map_err(io::Error::from)
    }
}

impl<T: Transport> Write for BufferedStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BufferedStream::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        BufferedStream::flush(self).map_err(io::Error::from)
    }
}

impl<T: Transport> Seek for BufferedStream<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        BufferedStream::seek(self, pos).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};

    use crate::fio::memory_io::MemoryIO;
    use crate::stream::BufferedStream;

    #[test]
    fn test_std_io_traits() {
        let mut stream = BufferedStream::with_capacity(MemoryIO::new(), 8).unwrap();
        writeln!(stream, "first line").unwrap();
        writeln!(stream, "second line").unwrap();
        Write::flush(&mut stream).unwrap();

        Seek::seek(&mut stream, SeekFrom::Start(0)).unwrap();
        let lines: Vec<String> = BufReader::new(&mut stream)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["first line", "second line"]);

        Seek::seek(&mut stream, SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        Read::read_to_string(&mut stream, &mut rest).unwrap();
        assert_eq!(rest, "line\nsecond line\n");
    }

    #[test]
    fn test_std_io_error_conversion() {
        let mut stream = BufferedStream::new(MemoryIO::new().non_seekable()).unwrap();
        let err = Seek::seek(&mut stream, SeekFrom::Start(0)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }
}
