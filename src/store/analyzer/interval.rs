// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Interval membership, monomorphized over endpoint closedness.
//!
//! The four boolean dimensions give 16 evaluators; analyzers pick one at
//! construction so the inner scan loop carries no flag checks.

/// One of the 16 closed/open/unbounded interval shapes.
pub(crate) trait RangeEval: Send + Sync + 'static {
    fn eval<T: PartialOrd + Copy>(value: T, min: T, max: T) -> bool;
}

pub(crate) struct ValueInInterval<
    const LEFT_CLOSED: bool,
    const RIGHT_CLOSED: bool,
    const LEFT_UNBOUNDED: bool,
    const RIGHT_UNBOUNDED: bool,
>;

impl<
        const LEFT_CLOSED: bool,
        const RIGHT_CLOSED: bool,
        const LEFT_UNBOUNDED: bool,
        const RIGHT_UNBOUNDED: bool,
    > RangeEval for ValueInInterval<LEFT_CLOSED, RIGHT_CLOSED, LEFT_UNBOUNDED, RIGHT_UNBOUNDED>
{
    #[inline]
    fn eval<T: PartialOrd + Copy>(value: T, min: T, max: T) -> bool {
        if LEFT_UNBOUNDED && RIGHT_UNBOUNDED {
            return true;
        }
        if LEFT_UNBOUNDED {
            return if RIGHT_CLOSED { value <= max } else { value < max };
        }
        if RIGHT_UNBOUNDED {
            return if LEFT_CLOSED { value >= min } else { value > min };
        }
        (if LEFT_CLOSED { value >= min } else { value > min })
            && (if RIGHT_CLOSED { value <= max } else { value < max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_open_combinations() {
        type ClosedClosed = ValueInInterval<true, true, false, false>;
        type OpenOpen = ValueInInterval<false, false, false, false>;
        type ClosedOpen = ValueInInterval<true, false, false, false>;
        type OpenClosed = ValueInInterval<false, true, false, false>;

        assert!(ClosedClosed::eval(5, 5, 10));
        assert!(ClosedClosed::eval(10, 5, 10));
        assert!(!ClosedClosed::eval(4, 5, 10));
        assert!(!ClosedClosed::eval(11, 5, 10));

        assert!(!OpenOpen::eval(5, 5, 10));
        assert!(!OpenOpen::eval(10, 5, 10));
        assert!(OpenOpen::eval(6, 5, 10));

        assert!(ClosedOpen::eval(5, 5, 10));
        assert!(!ClosedOpen::eval(10, 5, 10));

        assert!(!OpenClosed::eval(5, 5, 10));
        assert!(OpenClosed::eval(10, 5, 10));
    }

    #[test]
    fn test_unbounded_sides_ignore_endpoints() {
        type LeftUnbounded = ValueInInterval<true, true, true, false>;
        type RightUnbounded = ValueInInterval<true, true, false, true>;
        type BothUnbounded = ValueInInterval<false, false, true, true>;

        // min is irrelevant when the left side is unbounded
        assert!(LeftUnbounded::eval(-100, 5, 10));
        assert!(LeftUnbounded::eval(10, 5, 10));
        assert!(!LeftUnbounded::eval(11, 5, 10));

        assert!(RightUnbounded::eval(100, 5, 10));
        assert!(RightUnbounded::eval(5, 5, 10));
        assert!(!RightUnbounded::eval(4, 5, 10));

        // fully unbounded acts as the identity filter
        assert!(BothUnbounded::eval(i64::MIN, 5, 10));
        assert!(BothUnbounded::eval(i64::MAX, 5, 10));
    }

    #[test]
    fn test_float_intervals() {
        type ClosedClosed = ValueInInterval<true, true, false, false>;
        assert!(ClosedClosed::eval(1.5_f32, 1.5, 1.5));
        assert!(!ClosedClosed::eval(f32::NAN, 1.5, 1.5));
        assert!(ClosedClosed::eval(2.0_f32, 1.5, 2.5));
    }
}
