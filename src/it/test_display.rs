use {
    crate::{
        display::{Display, DisplayError},
        hwmem::GlobalName,
        it::test_events::{Event, EventLog},
        utils::oserror::OsError,
    },
    hwblit_algorithms::rect::Rect,
    std::{
        cell::{Cell, RefCell},
        ptr::NonNull,
        rc::Rc,
    },
    uapi::c,
};

pub struct TestDisplay {
    events: Rc<EventLog>,
    pub framebuffer: Cell<Option<(GlobalName, NonNull<u8>)>>,
    pub size: Cell<(i32, i32)>,
    pub scan_offset: Cell<i32>,
    pub damage: RefCell<Vec<Rect>>,
}

impl TestDisplay {
    pub fn new(events: &Rc<EventLog>) -> Rc<Self> {
        Rc::new(Self {
            events: events.clone(),
            framebuffer: Cell::new(None),
            size: Cell::new((0, 0)),
            scan_offset: Cell::new(0),
            damage: Default::default(),
        })
    }
}

impl Display for TestDisplay {
    fn framebuffer_name(&self) -> Result<GlobalName, DisplayError> {
        match self.framebuffer.get() {
            Some((name, _)) => Ok(name),
            None => Err(DisplayError::BufferName(OsError(c::ENODEV))),
        }
    }

    fn framebuffer_ptr(&self) -> Option<NonNull<u8>> {
        self.framebuffer.get().map(|(_, ptr)| ptr)
    }

    fn screen_size(&self) -> (i32, i32) {
        self.size.get()
    }

    fn scan_offset(&self) -> i32 {
        self.scan_offset.get()
    }

    fn reset_scan_offset(&self) -> Result<(), DisplayError> {
        self.scan_offset.set(0);
        self.events.push(Event::ResetScanOffset);
        Ok(())
    }

    fn damage(&self, rects: &[Rect]) {
        self.damage.borrow_mut().extend_from_slice(rects);
        self.events.push(Event::Damage(rects.to_vec()));
    }
}
