//! Output render target ownership and deferred recreation on resize.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Extent {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Clean,
    Dirty,
}

/// Owns the render target and recreates it lazily.
///
/// Resize notifications only record the requested size. The target is
/// rebuilt once, by [`OutputSurface::prepare`], at the start of the next
/// frame.
#[derive(Debug)]
pub struct OutputSurface<T> {
    target: Option<T>,
    extent: Extent,
    state: SurfaceState,
    reallocations: u64,
}

impl<T> OutputSurface<T> {
    pub fn new(target: T, extent: Extent) -> Self {
        Self {
            target: Some(target),
            extent,
            state: SurfaceState::Clean,
            reallocations: 0,
        }
    }

    /// The live target. `None` only after a failed reallocation.
    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    /// Current requested size. While dirty this is ahead of the target.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Record a new window size. Returns true when the surface became dirty.
    pub fn notify_resize(&mut self, extent: Extent) -> bool {
        if extent.is_empty() || extent == self.extent {
            return false;
        }
        tracing::debug!(
            width = extent.width,
            height = extent.height,
            "output surface marked dirty"
        );
        self.extent = extent;
        self.state = SurfaceState::Dirty;
        true
    }

    /// Rebuild the target if dirty.
    ///
    /// `on_resize` runs first with the new extent (projection update), then
    /// the old target is dropped and `allocate` builds the replacement.
    /// Returns the new extent when a rebuild happened.
    pub fn prepare<E>(
        &mut self,
        on_resize: impl FnOnce(Extent),
        allocate: impl FnOnce(Extent) -> Result<T, E>,
    ) -> Result<Option<Extent>, E> {
        if self.state == SurfaceState::Clean {
            return Ok(None);
        }

        let extent = self.extent;
        on_resize(extent);
        drop(self.target.take());
        self.target = Some(allocate(extent)?);
        self.state = SurfaceState::Clean;
        self.reallocations += 1;

        tracing::debug!(
            width = extent.width,
            height = extent.height,
            "output surface recreated"
        );
        Ok(Some(extent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Debug, PartialEq)]
    struct FakeTarget(Extent);

    fn surface(width: u32, height: u32) -> OutputSurface<FakeTarget> {
        let extent = Extent::new(width, height);
        OutputSurface::new(FakeTarget(extent), extent)
    }

    fn prepare(surface: &mut OutputSurface<FakeTarget>) -> Option<Extent> {
        surface
            .prepare(|_| {}, |e| Ok::<_, Infallible>(FakeTarget(e)))
            .unwrap()
    }

    #[test]
    fn resize_is_deferred_until_prepare() {
        let mut surface = surface(800, 600);
        assert!(surface.notify_resize(Extent::new(1024, 768)));
        assert_eq!(surface.state(), SurfaceState::Dirty);
        assert_eq!(surface.target(), Some(&FakeTarget(Extent::new(800, 600))));

        assert_eq!(prepare(&mut surface), Some(Extent::new(1024, 768)));
        assert_eq!(surface.state(), SurfaceState::Clean);
        assert_eq!(surface.target(), Some(&FakeTarget(Extent::new(1024, 768))));
    }

    #[test]
    fn repeated_resize_reallocates_once() {
        let mut surface = surface(800, 600);
        assert!(surface.notify_resize(Extent::new(1024, 768)));
        assert!(!surface.notify_resize(Extent::new(1024, 768)));

        prepare(&mut surface);
        assert_eq!(prepare(&mut surface), None);
        assert_eq!(surface.reallocations(), 1);
    }

    #[test]
    fn drag_collapses_into_one_reallocation() {
        let mut surface = surface(800, 600);
        for width in 801..900 {
            surface.notify_resize(Extent::new(width, 600));
        }
        assert_eq!(prepare(&mut surface), Some(Extent::new(899, 600)));
        assert_eq!(surface.reallocations(), 1);
    }

    #[test]
    fn empty_or_unchanged_size_is_ignored() {
        let mut surface = surface(800, 600);
        assert!(!surface.notify_resize(Extent::new(0, 600)));
        assert!(!surface.notify_resize(Extent::new(800, 0)));
        assert!(!surface.notify_resize(Extent::new(800, 600)));
        assert_eq!(surface.state(), SurfaceState::Clean);
        assert_eq!(surface.extent(), Extent::new(800, 600));
    }

    #[test]
    fn projection_hook_runs_before_allocation() {
        let mut surface = surface(800, 600);
        surface.notify_resize(Extent::new(640, 480));

        let order = std::cell::RefCell::new(Vec::new());
        surface
            .prepare(
                |_| order.borrow_mut().push("projection"),
                |e| {
                    order.borrow_mut().push("allocate");
                    Ok::<_, Infallible>(FakeTarget(e))
                },
            )
            .unwrap();
        assert_eq!(*order.borrow(), ["projection", "allocate"]);
    }

    #[test]
    fn failed_allocation_stays_dirty() {
        let mut surface = surface(800, 600);
        surface.notify_resize(Extent::new(640, 480));
        let result = surface.prepare(|_| {}, |_| Err("out of memory"));
        assert_eq!(result, Err("out of memory"));
        assert_eq!(surface.state(), SurfaceState::Dirty);
        assert_eq!(surface.reallocations(), 0);
        assert!(surface.target().is_none());
    }
}
