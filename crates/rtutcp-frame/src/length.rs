use crate::codec::RTU_MIN_SIZE;
use crate::function::{
    MASK_WRITE_REGISTER, READ_COILS, READ_DISCRETE_INPUTS, READ_HOLDING_REGISTERS,
    READ_INPUT_REGISTERS, READ_WRITE_MULTIPLE_REGISTERS, WRITE_MULTIPLE_COILS,
    WRITE_MULTIPLE_REGISTERS, WRITE_SINGLE_COIL, WRITE_SINGLE_REGISTER,
};

/// Predicts how many bytes a well-formed normal reply to a request has.
///
/// An answer of [`RTU_MIN_SIZE`] or less, or above the maximum frame size,
/// means "unknown": the framer then keeps whatever the first read returned.
pub trait ResponseLength {
    fn expected_length(&self, request: &[u8]) -> usize;
}

impl<F> ResponseLength for F
where
    F: Fn(&[u8]) -> usize,
{
    fn expected_length(&self, request: &[u8]) -> usize {
        self(request)
    }
}

/// Reply lengths for the public function codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLength;

impl ResponseLength for StandardLength {
    fn expected_length(&self, request: &[u8]) -> usize {
        expected_response_length(request)
    }
}

/// Expected normal-reply length for an encoded RTU request.
pub fn expected_response_length(request: &[u8]) -> usize {
    let Some(&function) = request.get(1) else {
        return RTU_MIN_SIZE;
    };

    match function {
        READ_COILS | READ_DISCRETE_INPUTS => match quantity(request) {
            Some(count) => RTU_MIN_SIZE + 1 + count.div_ceil(8),
            None => RTU_MIN_SIZE,
        },
        READ_HOLDING_REGISTERS | READ_INPUT_REGISTERS | READ_WRITE_MULTIPLE_REGISTERS => {
            match quantity(request) {
                Some(count) => RTU_MIN_SIZE + 1 + count * 2,
                None => RTU_MIN_SIZE,
            }
        }
        WRITE_SINGLE_COIL
        | WRITE_MULTIPLE_COILS
        | WRITE_SINGLE_REGISTER
        | WRITE_MULTIPLE_REGISTERS => RTU_MIN_SIZE + 4,
        MASK_WRITE_REGISTER => RTU_MIN_SIZE + 6,
        // FIFO queue replies carry their own count; undetermined here.
        _ => RTU_MIN_SIZE,
    }
}

// Quantity field: big-endian u16 right after the starting address.
fn quantity(request: &[u8]) -> Option<usize> {
    let bytes = request.get(4..6)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::READ_FIFO_QUEUE;

    fn request(function: u8, quantity: u16) -> Vec<u8> {
        let [hi, lo] = quantity.to_be_bytes();
        vec![0x01, function, 0x00, 0x10, hi, lo, 0xAA, 0xBB]
    }

    #[test]
    fn read_holding_registers() {
        assert_eq!(expected_response_length(&request(READ_HOLDING_REGISTERS, 1)), 7);
        assert_eq!(
            expected_response_length(&request(READ_HOLDING_REGISTERS, 125)),
            255
        );
        assert_eq!(expected_response_length(&request(READ_INPUT_REGISTERS, 3)), 11);
    }

    #[test]
    fn read_coils_rounds_up_to_whole_bytes() {
        assert_eq!(expected_response_length(&request(READ_COILS, 8)), 6);
        assert_eq!(expected_response_length(&request(READ_COILS, 9)), 7);
        assert_eq!(expected_response_length(&request(READ_DISCRETE_INPUTS, 1)), 6);
        assert_eq!(expected_response_length(&request(READ_DISCRETE_INPUTS, 2000)), 255);
    }

    #[test]
    fn write_replies_echo_fixed_fields() {
        for function in [
            WRITE_SINGLE_COIL,
            WRITE_SINGLE_REGISTER,
            WRITE_MULTIPLE_COILS,
            WRITE_MULTIPLE_REGISTERS,
        ] {
            assert_eq!(expected_response_length(&request(function, 2)), 8);
        }
        assert_eq!(expected_response_length(&request(MASK_WRITE_REGISTER, 0)), 10);
    }

    #[test]
    fn read_write_multiple_uses_read_quantity() {
        assert_eq!(
            expected_response_length(&request(READ_WRITE_MULTIPLE_REGISTERS, 6)),
            17
        );
    }

    #[test]
    fn undetermined_lengths_fall_back_to_minimum() {
        assert_eq!(expected_response_length(&request(READ_FIFO_QUEUE, 1)), RTU_MIN_SIZE);
        assert_eq!(expected_response_length(&request(0x2B, 1)), RTU_MIN_SIZE);
        assert_eq!(expected_response_length(&[0x01, READ_HOLDING_REGISTERS]), RTU_MIN_SIZE);
        assert_eq!(expected_response_length(&[0x01]), RTU_MIN_SIZE);
    }

    #[test]
    fn closures_act_as_oracles() {
        let fixed = |_: &[u8]| 9usize;
        assert_eq!(fixed.expected_length(&[0x01, 0x03]), 9);
        assert_eq!(StandardLength.expected_length(&request(READ_COILS, 16)), 7);
    }
}
