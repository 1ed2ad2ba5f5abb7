use crate::frame::Frame;

pub trait Executable {
    fn exec(self) -> Frame;
}
