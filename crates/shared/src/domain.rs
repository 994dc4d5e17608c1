use std::{fmt, hash::Hash, num::NonZeroUsize};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $inner:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(ItemId, u64);
id_newtype!(RequestId, u64);

impl RequestId {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Anything a model can page through. The identity key addresses items for
/// upsert/delete actions; fetch logic never inspects it.
pub trait Identifiable {
    type Id: Eq + Hash + Clone + fmt::Debug;

    fn id(&self) -> Self::Id;
}

pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Re-fetch the page the cursor points at.
    Refresh,
    /// Fetch the page after the current one.
    Advance,
}

/// A single fetch issued against a data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub page: usize,
    pub count: usize,
    pub offset: usize,
}

/// Pagination cursor owned by a model.
///
/// `page` is the index of the page currently shown. A cursor is *primed*
/// once any page has loaded since construction or the last [`reset`]; until
/// then an advance targets page zero instead of skipping it.
///
/// [`reset`]: PageCursor::reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    page: usize,
    page_size: NonZeroUsize,
    primed: bool,
}

impl PageCursor {
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self {
            page: 0,
            page_size,
            primed: false,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn offset(&self) -> usize {
        self.offset_of(self.page)
    }

    pub fn offset_of(&self, page: usize) -> usize {
        page.saturating_mul(self.page_size.get())
    }

    /// Page targeted by an advance from the current position.
    pub fn next_page(&self) -> usize {
        if self.primed {
            self.page.saturating_add(1)
        } else {
            self.page
        }
    }

    pub fn request(&self, id: RequestId, kind: RequestKind) -> PageRequest {
        let page = match kind {
            RequestKind::Refresh => self.page,
            RequestKind::Advance => self.next_page(),
        };
        PageRequest {
            id,
            kind,
            page,
            count: self.page_size.get(),
            offset: self.offset_of(page),
        }
    }

    pub fn reset(&mut self) {
        self.page = 0;
        self.primed = false;
    }

    /// Records that `request` succeeded.
    pub fn settle(&mut self, request: &PageRequest) {
        self.page = request.page;
        self.primed = true;
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
