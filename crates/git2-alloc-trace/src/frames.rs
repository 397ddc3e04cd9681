use std::ffi::c_void;

/// Instruction pointers of a captured call stack, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frames {
    ips: Vec<usize>,
}

impl Frames {
    pub fn capture(depth: usize) -> Frames {
        let mut ips = Vec::with_capacity(depth);
        if depth == 0 {
            return Frames { ips };
        }
        backtrace::trace(|frame| {
            ips.push(frame.ip() as usize);
            ips.len() < depth
        });
        Frames { ips }
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    /// Raw `0x...` addresses, or `symbol (file:line)` strings when
    /// `symbolize` is set and debug information is available.
    pub fn render(&self, symbolize: bool) -> Vec<String> {
        self.ips
            .iter()
            .map(|&ip| {
                if symbolize {
                    symbolize_ip(ip)
                } else {
                    format!("{ip:#x}")
                }
            })
            .collect()
    }
}

fn symbolize_ip(ip: usize) -> String {
    let mut out: Option<String> = None;
    backtrace::resolve(ip as *mut c_void, |symbol| {
        if out.is_some() {
            return;
        }
        let name = symbol
            .name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("{ip:#x}"));
        out = Some(match (symbol.filename(), symbol.lineno()) {
            (Some(file), Some(line)) => format!("{name} ({}:{line})", file.display()),
            _ => name,
        });
    });
    out.unwrap_or_else(|| {
        log::debug!("no symbol for {ip:#x}");
        format!("{ip:#x}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_zero_captures_nothing() {
        assert!(Frames::capture(0).is_empty());
    }

    #[test]
    fn capture_respects_depth() {
        let frames = Frames::capture(4);
        assert!(!frames.is_empty());
        assert!(frames.len() <= 4);
    }

    #[test]
    fn raw_rendering_is_hex() {
        let frames = Frames::capture(2).render(false);
        assert!(frames.iter().all(|f| f.starts_with("0x")));
    }

    #[test]
    fn symbolized_rendering_never_empty() {
        let frames = Frames::capture(3).render(true);
        assert!(frames.iter().all(|f| !f.is_empty()));
    }

    #[test]
    fn unresolvable_address_renders_as_hex() {
        assert_eq!(symbolize_ip(0x1), "0x1");
    }
}
