/// A store command: the command name followed by binary arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    args: Vec<Vec<u8>>,
}

/// Anything that can be sent as a single command argument.
pub trait ToArg {
    fn to_arg(&self) -> Vec<u8>;
}

impl Cmd {
    pub fn new(name: &str) -> Self {
        Self {
            args: vec![name.as_bytes().to_vec()],
        }
    }

    pub fn arg(mut self, arg: impl ToArg) -> Self {
        self.args.push(arg.to_arg());
        self
    }

    pub fn args<A: ToArg>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.to_arg()));
        self
    }

    /// Upper-cased command name.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).to_uppercase()
    }

    /// Full argument vector, command name first.
    pub fn as_args(&self) -> &[Vec<u8>] {
        &self.args
    }
}

impl ToArg for &str {
    fn to_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToArg for &String {
    fn to_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToArg for &[u8] {
    fn to_arg(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Vec<u8> {
        self.clone()
    }
}

impl ToArg for &Vec<u8> {
    fn to_arg(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl ToArg for i64 {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for usize {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> Vec<u8> {
        format_score(*self).into_bytes()
    }
}

/// Score text the store parses back to the same f64.
pub fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        let cmd = Cmd::new("hset").arg("k").arg(b"v\0".as_slice()).arg(3i64);
        let args: Vec<&[u8]> = cmd.as_args().iter().map(|a| a.as_slice()).collect();
        assert_eq!(args, vec![&b"hset"[..], b"k", b"v\0", b"3"]);
        assert_eq!(cmd.name(), "HSET");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(25.0), "25");
        assert_eq!(format_score(-1.5), "-1.5");
        assert_eq!(format_score(f64::INFINITY), "+inf");
        assert_eq!(Cmd::new("zadd").arg(2.5f64).as_args()[1], b"2.5");
    }
}
