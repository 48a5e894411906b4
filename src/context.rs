//! Execution context: which process this is and how many there are.

use crate::{DdaError, Result};

/// Environment variable pairs read by [`Context::from_env`], in order.
const ENV_PAIRS: [(&str, &str); 3] = [
    ("OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI_RANK", "PMI_SIZE"),
    ("DDA_RANK", "DDA_SIZE"),
];

/// Rank of this process within a process group of `size` processes.
///
/// Passed explicitly to anything that needs distribution information;
/// there is no process-wide default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context {
    rank: usize,
    size: usize,
}

impl Context {
    /// Single-process context: rank 0 of 1.
    pub const fn local() -> Self {
        Self { rank: 0, size: 1 }
    }

    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 || rank >= size {
            return Err(DdaError::InvalidContext { rank, size });
        }
        Ok(Self { rank, size })
    }

    /// Context described by the process launcher's environment.
    ///
    /// Reads Open MPI, then PMI, then `DDA_RANK`/`DDA_SIZE`. Pairs that are
    /// missing or malformed are skipped; with none usable the context is
    /// [`Context::local`].
    pub fn from_env() -> Self {
        for (rank_var, size_var) in ENV_PAIRS {
            let (Ok(rank), Ok(size)) = (std::env::var(rank_var), std::env::var(size_var)) else {
                continue;
            };
            match (rank.trim().parse(), size.trim().parse()) {
                (Ok(rank), Ok(size)) => match Self::new(rank, size) {
                    Ok(ctx) => {
                        log::debug!("context from {}/{}: rank {} of {}", rank_var, size_var, rank, size);
                        return ctx;
                    }
                    Err(e) => log::warn!("ignoring {}/{}: {}", rank_var, size_var, e),
                },
                _ => log::warn!("ignoring {}/{}: not a number", rank_var, size_var),
            }
        }
        Self::local()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local() {
        let ctx = Context::local();
        assert_eq!((ctx.rank(), ctx.size()), (0, 1));
        assert_eq!(Context::default(), ctx);
    }

    #[test]
    fn test_new_validates() {
        assert!(Context::new(3, 4).is_ok());
        assert!(matches!(
            Context::new(4, 4),
            Err(DdaError::InvalidContext { rank: 4, size: 4 })
        ));
        assert!(Context::new(0, 0).is_err());
    }

    #[test]
    fn test_from_env_precedence() {
        // All environment mutation stays inside this one test.
        let vars: Vec<&str> = ENV_PAIRS.iter().flat_map(|&(r, s)| [r, s]).collect();
        let saved: Vec<_> = vars.iter().map(|&v| (v, std::env::var_os(v))).collect();
        let set = |pairs: &[(&str, &str)]| {
            for v in &vars {
                std::env::remove_var(v);
            }
            for (k, v) in pairs {
                std::env::set_var(k, v);
            }
        };

        set(&[]);
        assert_eq!(Context::from_env(), Context::local());

        set(&[("DDA_RANK", "2"), ("DDA_SIZE", "4")]);
        assert_eq!(Context::from_env(), Context::new(2, 4).unwrap());

        set(&[
            ("OMPI_COMM_WORLD_RANK", "one"),
            ("OMPI_COMM_WORLD_SIZE", "4"),
            ("DDA_RANK", "2"),
            ("DDA_SIZE", "4"),
        ]);
        assert_eq!(Context::from_env(), Context::new(2, 4).unwrap());

        set(&[
            ("OMPI_COMM_WORLD_RANK", "one"),
            ("OMPI_COMM_WORLD_SIZE", "4"),
            ("PMI_RANK", " 1 "),
            ("PMI_SIZE", "3"),
            ("DDA_RANK", "2"),
            ("DDA_SIZE", "4"),
        ]);
        assert_eq!(Context::from_env(), Context::new(1, 3).unwrap());

        set(&[
            ("OMPI_COMM_WORLD_RANK", "0"),
            ("OMPI_COMM_WORLD_SIZE", "8"),
            ("PMI_RANK", "1"),
            ("PMI_SIZE", "3"),
        ]);
        assert_eq!(Context::from_env(), Context::new(0, 8).unwrap());

        set(&[("DDA_RANK", "4"), ("DDA_SIZE", "4")]);
        assert_eq!(Context::from_env(), Context::local());

        set(&[("PMI_RANK", "0"), ("PMI_SIZE", "0")]);
        assert_eq!(Context::from_env(), Context::local());

        for (k, v) in saved {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
    }
}
