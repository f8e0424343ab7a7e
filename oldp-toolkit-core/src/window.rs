//! Skip/limit windowing over a fallible record stream.

/// Discard the first `skip` items, then keep at most `limit` (unbounded when `None`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Window {
    pub fn new(skip: usize, limit: Option<usize>) -> Self {
        Self { skip, limit }
    }

    pub fn apply<I, T, E>(self, inner: I) -> Windowed<I>
    where
        I: Iterator<Item = Result<T, E>>,
    {
        Windowed {
            inner,
            to_skip: self.skip,
            remaining: self.limit,
        }
    }
}

/// Iterator returned by [`Window::apply`].
///
/// Errors are passed through even inside the skipped prefix. Once the limit is
/// reached the inner iterator is never polled again.
pub struct Windowed<I> {
    inner: I,
    to_skip: usize,
    remaining: Option<usize>,
}

impl<I, T, E> Iterator for Windowed<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        while self.to_skip > 0 {
            match self.inner.next()? {
                Ok(_) => self.to_skip -= 1,
                Err(e) => return Some(Err(e)),
            }
        }
        let item = self.inner.next()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(item)
    }
}
